use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::csv::tokenize;
use crate::error::BoardError;
use crate::layout::LayoutMode;
use crate::normalize::normalize;
use crate::status::StatusSummary;
use crate::team::{TeamId, TeamRecord};

/// A normalized team with its evaluated status, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamView {
    pub id: TeamId,
    pub record: TeamRecord,
    pub summary: StatusSummary,
}

/// Render-ready result of one successful refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub teams: Vec<TeamView>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub dropped_rows: usize,
}

/// What the detail view shows for a requested identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailView<'a> {
    Found(&'a TeamView),
    NotFound(BoardError),
}

impl Dashboard {
    /// Tokenizes, normalizes and evaluates a sheet body in one pass.
    pub fn from_csv(
        text: &str,
        layout: LayoutMode,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, BoardError> {
        let rows = tokenize(text)?;
        let normalized = normalize(&rows, layout);
        Ok(Self::from_records(
            normalized.teams,
            normalized.dropped_rows,
            updated_at,
        ))
    }

    pub fn from_records(
        records: Vec<TeamRecord>,
        dropped_rows: usize,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let teams = records
            .into_iter()
            .enumerate()
            .map(|(idx, record)| TeamView {
                id: TeamId(idx),
                summary: StatusSummary::evaluate(&record),
                record,
            })
            .collect();

        Self {
            teams,
            updated_at,
            dropped_rows,
        }
    }

    /// Looks up a team by its positional identifier token.
    pub fn resolve(&self, raw_id: &str) -> Result<&TeamView, BoardError> {
        raw_id
            .parse::<TeamId>()
            .ok()
            .and_then(|id| self.teams.get(id.0))
            .ok_or_else(|| BoardError::UnresolvedIdentifier(raw_id.trim().to_string()))
    }

    pub fn detail(&self, raw_id: &str) -> DetailView<'_> {
        match self.resolve(raw_id) {
            Ok(team) => DetailView::Found(team),
            Err(e) => DetailView::NotFound(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Dashboard, DetailView};
    use crate::error::BoardError;
    use crate::layout::LayoutMode;
    use crate::status::Classification;
    use crate::team::TeamId;

    const CANONICAL: &str = "チーム名,ミッション①,ミッション②,ミッション③,ミッション④,ミッション⑤,ミッション⑥,ミッション⑦,ミッション⑧,ミッション⑨\n\
        Team Test,TRUE,TRUE,FALSE,FALSE,TRUE,FALSE,FALSE,FALSE,FALSE\n\
        Team Done,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE,TRUE\n\
        Team Idle,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE,FALSE";

    fn dashboard() -> Dashboard {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        Dashboard::from_csv(CANONICAL, LayoutMode::LabeledBoolean, now).expect("sheet should parse")
    }

    #[test]
    fn canonical_row_is_in_progress_with_three_missions() {
        let board = dashboard();
        let team = &board.teams[0];
        assert_eq!(team.record.name, "Team Test");
        assert_eq!(team.summary.completed_count, 3);
        assert_eq!(team.summary.classification, Classification::InProgress);
        assert_eq!(team.summary.label, "In Progress");
        assert_eq!(board.teams[1].summary.classification, Classification::Complete);
        assert_eq!(board.teams[2].summary.classification, Classification::Pending);
    }

    #[test]
    fn identifiers_follow_row_position() {
        let board = dashboard();
        let ids: Vec<_> = board.teams.iter().map(|team| team.id).collect();
        assert_eq!(ids, vec![TeamId(0), TeamId(1), TeamId(2)]);
        assert_eq!(
            board.resolve("1").map(|team| team.record.name.as_str()),
            Ok("Team Done")
        );
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let board = dashboard();
        assert_eq!(
            board.resolve("99"),
            Err(BoardError::UnresolvedIdentifier("99".to_string()))
        );
        assert!(matches!(board.detail("abc"), DetailView::NotFound(_)));
        assert!(matches!(board.detail(" 2 "), DetailView::Found(team) if team.id == TeamId(2)));
    }

    #[test]
    fn sentinel_body_fails_before_normalizing() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let err = Dashboard::from_csv("ERROR: Not published", LayoutMode::LabeledBoolean, now)
            .expect_err("sentinel should fail");
        assert!(matches!(err, BoardError::MalformedInput(ref m) if m.contains("Not published")));
    }

    #[test]
    fn dashboard_serializes_team_ids_as_plain_numbers() {
        let json = serde_json::to_value(dashboard()).expect("dashboard should serialize");
        assert_eq!(json["teams"][2]["id"], serde_json::json!(2));
        assert_eq!(
            json["teams"][0]["summary"]["classification"],
            serde_json::json!("InProgress")
        );
    }
}
