//! Row-to-team normalization for the supported sheet layouts.
//!
//! The first tokenized row is always the header. Data rows become
//! [`TeamRecord`]s in sheet order; a record's index in the output is its
//! [`TeamId`](crate::TeamId).

use crate::csv::RawRow;
use crate::layout::LayoutMode;
use crate::team::{
    MISSION_COUNT, Mission, PLACEHOLDER_LABEL, PLACEHOLDER_NAME, TEAM_NAME_ALIASES, TeamRecord,
    mission_key, mission_key_aliases,
};

const COMPLETE_TOKEN: &str = "TRUE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub teams: Vec<TeamRecord>,
    /// Data rows rejected by the layout's width policy.
    pub dropped_rows: usize,
}

pub fn normalize(rows: &[RawRow], mode: LayoutMode) -> Normalized {
    let Some((header, data)) = rows.split_first() else {
        return Normalized::default();
    };

    match mode {
        LayoutMode::LabeledBoolean => {
            normalize_labeled(header, data, |row_len, header_len| row_len == header_len)
        }
        LayoutMode::FlexibleLabeled => {
            normalize_labeled(header, data, |row_len, header_len| row_len >= header_len)
        }
        LayoutMode::InterleavedPairs => Normalized {
            teams: data.iter().map(interleaved_record).collect(),
            dropped_rows: 0,
        },
    }
}

pub fn is_complete_token(value: &str) -> bool {
    value.trim().to_uppercase() == COMPLETE_TOKEN
}

/// Header columns resolved once per sheet, so data rows are read by index.
struct LabeledColumns {
    width: usize,
    name: Vec<usize>,
    missions: Vec<(String, Option<usize>)>,
}

impl LabeledColumns {
    fn resolve(header: &RawRow) -> Self {
        let position = |key: &str| header.iter().position(|column| column.trim() == key);

        let name = TEAM_NAME_ALIASES
            .iter()
            .filter_map(|alias| position(alias))
            .collect();

        let missions = (1..=MISSION_COUNT)
            .map(|number| {
                let aliases = mission_key_aliases(number);
                let found = aliases
                    .iter()
                    .find_map(|alias| position(alias).map(|idx| (alias.clone(), idx)));
                match found {
                    Some((label, idx)) => (label, Some(idx)),
                    None => (mission_key(number), None),
                }
            })
            .collect();

        Self {
            width: header.len(),
            name,
            missions,
        }
    }

    fn record(&self, row: &RawRow) -> TeamRecord {
        let name = self
            .name
            .iter()
            .filter_map(|&idx| row.get(idx))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or(PLACEHOLDER_NAME)
            .to_string();

        let missions = self
            .missions
            .iter()
            .map(|(label, idx)| Mission {
                label: label.clone(),
                complete: idx
                    .and_then(|idx| row.get(idx))
                    .is_some_and(|value| is_complete_token(value)),
            })
            .collect();

        TeamRecord { name, missions }
    }
}

fn normalize_labeled(
    header: &RawRow,
    data: &[RawRow],
    accepts_width: impl Fn(usize, usize) -> bool,
) -> Normalized {
    let columns = LabeledColumns::resolve(header);
    let mut normalized = Normalized::default();

    for row in data {
        if !accepts_width(row.len(), columns.width) {
            normalized.dropped_rows += 1;
            continue;
        }
        normalized.teams.push(columns.record(row));
    }

    normalized
}

fn interleaved_record(row: &RawRow) -> TeamRecord {
    let name = row
        .first()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(PLACEHOLDER_NAME)
        .to_string();

    let missions = (0..MISSION_COUNT)
        .map(|slot| {
            let content = row
                .get(1 + slot * 2)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .unwrap_or(PLACEHOLDER_LABEL);
            let complete = row
                .get(2 + slot * 2)
                .is_some_and(|value| is_complete_token(value));
            Mission {
                label: content.to_string(),
                complete,
            }
        })
        .collect();

    TeamRecord { name, missions }
}
