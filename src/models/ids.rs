//! Player identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The all-zero puuid the client reports for slots it has not resolved yet.
pub const EMPTY_PUUID: &str = "00000000-0000-0000-0000-000000000000";

/// A player's globally unique id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Puuid(String);

impl Puuid {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// True for empty ids and the client's all-zero placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.0.is_empty() || self.0 == EMPTY_PUUID
    }
}

impl fmt::Display for Puuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Puuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Puuid({})", self.0)
    }
}

impl From<String> for Puuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Puuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
