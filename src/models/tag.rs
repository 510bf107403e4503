//! Match-history tag filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Queues the auxiliary backend is known to return non-empty filtered results for.
pub const SAFE_QUEUE_IDS: [i64; 9] = [420, 430, 440, 450, 490, 900, 1400, 1700, 1900];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid match history tag: {0}")]
pub struct InvalidTag(pub String);

/// Filter applied to auxiliary match-history queries: `all` or `q_<queue id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagFilter {
    #[default]
    All,
    Queue(i64),
}

impl TagFilter {
    /// True when the filter is `all` or a queue from the allow-list.
    pub fn is_safe(&self) -> bool {
        match self {
            TagFilter::All => true,
            TagFilter::Queue(id) => SAFE_QUEUE_IDS.contains(id),
        }
    }

    /// Query-string form, `None` when no filtering applies.
    pub fn as_query(&self) -> Option<String> {
        match self {
            TagFilter::All => None,
            TagFilter::Queue(_) => Some(self.to_string()),
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFilter::All => write!(f, "all"),
            TagFilter::Queue(id) => write!(f, "q_{}", id),
        }
    }
}

impl FromStr for TagFilter {
    type Err = InvalidTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(TagFilter::All);
        }

        s.strip_prefix("q_")
            .and_then(|id| id.parse().ok())
            .map(TagFilter::Queue)
            .ok_or_else(|| InvalidTag(s.to_string()))
    }
}

impl Serialize for TagFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How to pick a filter when none was requested explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagPreference {
    #[default]
    All,
    /// Filter by the queue of the game being played, when it is allow-listed.
    Current,
}
