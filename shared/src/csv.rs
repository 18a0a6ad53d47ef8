//! Minimal CSV tokenizer for published spreadsheet exports.
//!
//! Fields are split naively on `,`. Quoted fields with embedded commas are not
//! supported; published mission sheets never contain them.

use crate::error::BoardError;

/// Prefix a transport wrapper writes in place of CSV when the upstream fetch failed.
pub const ERROR_SENTINEL: &str = "ERROR:";

const BYTE_ORDER_MARK: char = '\u{FEFF}';
const MAX_ERROR_PREVIEW_CHARS: usize = 200;

/// Trimmed fields of one non-blank line.
pub type RawRow = Vec<String>;

pub fn tokenize(text: &str) -> Result<Vec<RawRow>, BoardError> {
    if text.starts_with(ERROR_SENTINEL) {
        let preview = text
            .trim()
            .chars()
            .take(MAX_ERROR_PREVIEW_CHARS)
            .collect::<String>();
        return Err(BoardError::MalformedInput(preview));
    }

    let mut rows = Vec::new();
    for line in text.trim().split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut row: RawRow = line.split(',').map(|field| field.trim().to_string()).collect();
        if rows.is_empty()
            && let Some(first) = row.first_mut()
            && let Some(stripped) = first.strip_prefix(BYTE_ORDER_MARK)
        {
            *first = stripped.trim_start().to_string();
        }
        rows.push(row);
    }

    Ok(rows)
}
