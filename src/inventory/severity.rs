use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Closed severity scale with a total order: CRITICAL > HIGH > MEDIUM > LOW > INFO.
///
/// `Ord` is hand-implemented against `rank()` rather than derived, since the
/// natural declaration order (CRITICAL first, for readability in match arms
/// throughout the rule catalog) is the reverse of derive's "first variant is
/// smallest" convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Total order rank used for sorting and `ShouldFail`: higher is worse.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
            Severity::Low => 2,
            Severity::Info => 1,
        }
    }

    pub fn parse_loose(s: &str) -> Option<Severity> {
        Severity::from_str(&s.to_lowercase()).ok()
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}
