use serde::{Deserialize, Serialize};

use crate::team::{MISSION_COUNT, TeamRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Pending,
    InProgress,
    Complete,
}

impl Classification {
    pub const fn from_count(completed_count: usize, total: usize) -> Self {
        if completed_count >= total {
            Classification::Complete
        } else if completed_count == 0 {
            Classification::Pending
        } else {
            Classification::InProgress
        }
    }

    /// Badge text shown on a team card.
    pub const fn label(self) -> &'static str {
        match self {
            Classification::Pending => "Start",
            Classification::InProgress => "In Progress",
            Classification::Complete => "All Clear!",
        }
    }

    /// CSS class used by the dashboard stylesheet.
    pub const fn css_class(self) -> &'static str {
        match self {
            Classification::Pending => "pending",
            Classification::InProgress => "progress",
            Classification::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub completed_count: usize,
    pub total: usize,
    pub classification: Classification,
    pub label: String,
}

impl StatusSummary {
    /// Scores `record` out of [`MISSION_COUNT`]; missions beyond the record's
    /// length count as incomplete and extra entries are ignored.
    pub fn evaluate(record: &TeamRecord) -> Self {
        let completed_count = record
            .completion_flags()
            .iter()
            .filter(|done| **done)
            .count();
        let classification = Classification::from_count(completed_count, MISSION_COUNT);

        Self {
            completed_count,
            total: MISSION_COUNT,
            classification,
            label: classification.label().to_string(),
        }
    }
}
