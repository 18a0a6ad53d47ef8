use std::fmt;

/// Failures a refresh cycle or a detail lookup can end in.
///
/// None of these are fatal: the server renders each one as an error or
/// not-found state and the next poll starts over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// The sheet could not be fetched (network error or non-success status).
    TransportFailure(String),
    /// The fetched body carried the in-band error sentinel instead of CSV.
    MalformedInput(String),
    /// A detail view asked for a team identifier with no matching record.
    UnresolvedIdentifier(String),
}

impl BoardError {
    pub fn kind(&self) -> &'static str {
        match self {
            BoardError::TransportFailure(_) => "transport_failure",
            BoardError::MalformedInput(_) => "malformed_input",
            BoardError::UnresolvedIdentifier(_) => "not_found",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BoardError::TransportFailure(msg)
            | BoardError::MalformedInput(msg)
            | BoardError::UnresolvedIdentifier(msg) => msg,
        }
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::TransportFailure(msg) => write!(f, "failed to fetch sheet: {msg}"),
            BoardError::MalformedInput(msg) => write!(f, "sheet returned an error: {msg}"),
            BoardError::UnresolvedIdentifier(id) => write!(f, "no team with id {id:?}"),
        }
    }
}

impl std::error::Error for BoardError {}
