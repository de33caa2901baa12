pub mod models;

pub use models::{ActiveRaid, Lock, LockRequest, Priority, Raid, RaidId, RaidMode};
