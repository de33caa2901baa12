use softlock_types::{RaidId, RaidMode};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    LockPoisoned,

    /// A write addressed "the active raid" while every raid is closed.
    #[error("no active raid")]
    NoActiveRaid,

    #[error("raid {0} does not exist")]
    RaidNotFound(RaidId),

    #[error("raid {raid_id} is {mode} and does not accept lock changes")]
    RegistrationClosed { raid_id: RaidId, mode: RaidMode },

    #[error("raid {raid_id} already holds the maximum of {capacity} locks")]
    CapacityReached { raid_id: RaidId, capacity: u64 },

    #[error("{user} already holds a lock on raid {raid_id}")]
    AlreadyRegistered { raid_id: RaidId, user: String },

    #[error("lock of {user} on raid {raid_id} cannot be cancelled")]
    CancellationRefused { raid_id: RaidId, user: String },
}
