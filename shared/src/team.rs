use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every team is scored out of this many missions, whatever the sheet holds.
pub const MISSION_COUNT: usize = 9;

/// Label used for missions whose content cell is missing or empty.
pub const PLACEHOLDER_LABEL: &str = "-";

/// Name given to rows whose team-name cell is missing or empty.
pub const PLACEHOLDER_NAME: &str = "No Name";

/// Header keys for the team-name column, in lookup order.
pub const TEAM_NAME_ALIASES: [&str; 2] = ["チーム名", "Team Name"];

const CIRCLED_DIGITS: [char; MISSION_COUNT] = ['①', '②', '③', '④', '⑤', '⑥', '⑦', '⑧', '⑨'];

/// Canonical header for the 1-based mission `number`, e.g. `ミッション③`.
pub fn mission_key(number: usize) -> String {
    match number.checked_sub(1).and_then(|idx| CIRCLED_DIGITS.get(idx)) {
        Some(digit) => format!("ミッション{digit}"),
        None => format!("ミッション{number}"),
    }
}

/// Header keys accepted for the 1-based mission `number`, in lookup order.
pub fn mission_key_aliases(number: usize) -> [String; 2] {
    [mission_key(number), format!("Mission {number}")]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub label: String,
    pub complete: bool,
}

impl Mission {
    pub fn placeholder() -> Self {
        Self {
            label: PLACEHOLDER_LABEL.to_string(),
            complete: false,
        }
    }
}

/// One team's row after normalization. Missions are ordered by mission
/// number and may be fewer than [`MISSION_COUNT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub name: String,
    pub missions: Vec<Mission>,
}

impl TeamRecord {
    /// Completion flag for each of the [`MISSION_COUNT`] slots. Absent
    /// missions read as incomplete.
    pub fn completion_flags(&self) -> [bool; MISSION_COUNT] {
        let mut flags = [false; MISSION_COUNT];
        for (flag, mission) in flags.iter_mut().zip(&self.missions) {
            *flag = mission.complete;
        }
        flags
    }
}

/// Positional team identifier: the record's index in the current cycle's list.
///
/// Shifts whenever the upstream sheet reorders its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub usize);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TeamId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<usize>().map(TeamId)
    }
}
