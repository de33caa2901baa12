use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned raid identifier.
pub type RaidId = i64;

/// Lifecycle of a raid. Stored as a small integer in the `raids.mode` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum RaidMode {
    /// Created, not yet accepting locks
    Pending,
    /// Accepting locks
    Started,
    /// Locks are listed publicly
    Shown,
    Closed,
    /// Any value written through an unchecked mode update.
    Other(i64),
}

impl RaidMode {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Started => 1,
            Self::Shown => 2,
            Self::Closed => 3,
            Self::Other(v) => v,
        }
    }

    /// A raid counts towards "active" while its mode is below `Closed`.
    pub fn is_open(self) -> bool {
        self.as_i64() < 3
    }

    /// Members may register or withdraw locks only while a raid is started.
    pub fn accepts_registrations(self) -> bool {
        self == Self::Started
    }

    /// Forward successor, or `None` once closed (or for unknown modes).
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Started),
            Self::Started => Some(Self::Shown),
            Self::Shown => Some(Self::Closed),
            Self::Closed | Self::Other(_) => None,
        }
    }
}

impl From<i64> for RaidMode {
    fn from(v: i64) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Started,
            2 => Self::Shown,
            3 => Self::Closed,
            other => Self::Other(other),
        }
    }
}

impl From<RaidMode> for i64 {
    fn from(mode: RaidMode) -> Self {
        mode.as_i64()
    }
}

impl fmt::Display for RaidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Started => f.write_str("started"),
            Self::Shown => f.write_str("shown"),
            Self::Closed => f.write_str("closed"),
            Self::Other(v) => write!(f, "mode {}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raid {
    pub id: RaidId,
    pub name: String,
    pub dungeon: String,
    /// Missing on raids created by the old web backend.
    pub date: Option<NaiveDate>,
    pub mode: RaidMode,
}

/// A single priority slot of a lock. The column carries no type affinity, so
/// integers and item names both round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Priority {
    Int(i64),
    Text(String),
    Empty,
}

impl Priority {
    /// Parses operator input: integers stay integers, anything else is text.
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "" => Self::Empty,
            s => s
                .parse::<i64>()
                .map(Self::Int)
                .unwrap_or_else(|_| Self::Text(s.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<i64> for Priority {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Priority {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for Priority {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Priority {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Empty => f.write_str("-"),
        }
    }
}

/// A user's reservation against one raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub raid_id: RaidId,
    pub user_name: String,
    pub class: Option<String>,
    pub specialization: Option<String>,
    pub prio1: Priority,
    pub prio2: Priority,
    pub editable: bool,
}

/// Self-service registration submitted by a raid member.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockRequest {
    pub user_name: String,
    pub class: String,
    pub specialization: String,
    #[serde(default = "empty_priority")]
    pub prio1: Priority,
    #[serde(default = "empty_priority")]
    pub prio2: Priority,
}

fn empty_priority() -> Priority {
    Priority::Empty
}

/// Outcome of looking up the active raid. Keeps a failed query distinct from
/// a genuinely empty registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveRaid {
    Found(RaidId),
    NotFound,
    QueryFailed(String),
}

impl ActiveRaid {
    pub fn id(&self) -> Option<RaidId> {
        match self {
            Self::Found(id) => Some(*id),
            Self::NotFound | Self::QueryFailed(_) => None,
        }
    }
}
