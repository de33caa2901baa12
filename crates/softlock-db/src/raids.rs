use chrono::Local;
use rusqlite::{Connection, OptionalExtension};
use softlock_types::{ActiveRaid, Raid, RaidId, RaidMode};
use tracing::{info, warn};

use crate::models::{DATE_FORMAT, RAID_COLUMNS, raid_from_row};
use crate::{Database, RegistryError, Result};

impl Database {
    // -- Active raid --

    /// Looks up the newest raid that is not closed yet.
    pub fn active_raid_lookup(&self) -> ActiveRaid {
        let result = self.with_conn(|conn| query_active_raid(conn).map_err(RegistryError::from));
        match result {
            Ok(Some(id)) => ActiveRaid::Found(id),
            Ok(None) => ActiveRaid::NotFound,
            Err(e) => ActiveRaid::QueryFailed(e.to_string()),
        }
    }

    /// Id of the active raid. A failed lookup reads as "no active raid".
    pub fn active_raid_no(&self) -> Option<RaidId> {
        match self.active_raid_lookup() {
            ActiveRaid::Found(id) => Some(id),
            ActiveRaid::NotFound => None,
            ActiveRaid::QueryFailed(cause) => {
                warn!("Active raid lookup failed: {}", cause);
                None
            }
        }
    }

    // -- Raids --

    /// Creates a pending raid dated today and returns its id.
    pub fn add_raid(&self, name: &str, dungeon: &str) -> Result<RaidId> {
        let date = Local::now().date_naive().format(DATE_FORMAT).to_string();
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO raids (name, dungeon, date, mode) VALUES (?1, ?2, ?3, ?4)",
                (name, dungeon, &date, RaidMode::Pending.as_i64()),
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        info!("Raid {} created: {} ({})", id, name, dungeon);
        Ok(id)
    }

    pub fn get_raid(&self, raid_id: RaidId) -> Result<Option<Raid>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM raids WHERE raid_id = ?1", RAID_COLUMNS);
            Ok(conn.query_row(&sql, [raid_id], raid_from_row).optional()?)
        })
    }

    pub fn list_raids(&self) -> Result<Vec<Raid>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM raids ORDER BY raid_id", RAID_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], raid_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Lifecycle --

    /// Overwrites the mode of a raid. Unknown ids are silently ignored and
    /// the mode is not checked against the current one.
    pub fn set_mode(&self, raid_id: RaidId, mode: RaidMode) -> Result<()> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE raids SET mode = ?1 WHERE raid_id = ?2",
                (mode.as_i64(), raid_id),
            )?)
        })?;

        if changed == 0 {
            warn!("set_mode: raid {} does not exist", raid_id);
        } else {
            info!("Raid {} is now {}", raid_id, mode);
        }
        Ok(())
    }

    /// Opens the active raid for locks.
    pub fn start(&self) -> Result<Option<RaidId>> {
        self.set_active_mode(RaidMode::Started)
    }

    /// Publishes the locks of the active raid.
    pub fn show(&self) -> Result<Option<RaidId>> {
        self.set_active_mode(RaidMode::Shown)
    }

    /// Closes the active raid; the next newest open raid becomes active.
    pub fn close(&self) -> Result<Option<RaidId>> {
        self.set_active_mode(RaidMode::Closed)
    }

    fn set_active_mode(&self, mode: RaidMode) -> Result<Option<RaidId>> {
        let Some(raid_id) = self.active_raid_no() else {
            warn!("No active raid, cannot switch to {}", mode);
            return Ok(None);
        };
        self.set_mode(raid_id, mode)?;
        Ok(Some(raid_id))
    }
}

fn query_active_raid(conn: &Connection) -> rusqlite::Result<Option<RaidId>> {
    // MAX over an empty set yields a single NULL row
    conn.query_row("SELECT MAX(raid_id) FROM raids WHERE mode < 3", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn mode_of(db: &Database, id: RaidId) -> RaidMode {
        db.get_raid(id).unwrap().unwrap().mode
    }

    #[test]
    fn empty_registry_has_no_active_raid() {
        let db = db();
        assert_eq!(db.active_raid_lookup(), ActiveRaid::NotFound);
        assert_eq!(db.active_raid_no(), None);
    }

    #[test]
    fn newest_open_raid_is_active() {
        let db = db();
        let first = db.add_raid("MC", "Molten Core").unwrap();
        assert_eq!(db.active_raid_no(), Some(first));

        let second = db.add_raid("BWL", "Blackwing Lair").unwrap();
        assert!(second > first);
        assert_eq!(db.active_raid_no(), Some(second));

        db.set_mode(second, RaidMode::Closed).unwrap();
        assert_eq!(db.active_raid_no(), Some(first));

        db.set_mode(first, RaidMode::Closed).unwrap();
        assert_eq!(db.active_raid_no(), None);
    }

    #[test]
    fn add_raid_records_pending_raid_dated_today() {
        let db = db();
        let id = db.add_raid("Naxx", "Naxxramas").unwrap();
        let raid = db.get_raid(id).unwrap().unwrap();
        assert_eq!(raid.name, "Naxx");
        assert_eq!(raid.dungeon, "Naxxramas");
        assert_eq!(raid.mode, RaidMode::Pending);
        assert_eq!(raid.date, Some(Local::now().date_naive()));
    }

    #[test]
    fn duplicate_raids_are_allowed() {
        let db = db();
        db.add_raid("Naxx", "Naxxramas").unwrap();
        db.add_raid("Naxx", "Naxxramas").unwrap();
        assert_eq!(db.list_raids().unwrap().len(), 2);
    }

    #[test]
    fn lifecycle_walks_through_modes() {
        let db = db();
        let id = db.add_raid("Naxx", "Naxxramas").unwrap();

        assert_eq!(db.start().unwrap(), Some(id));
        assert_eq!(mode_of(&db, id), RaidMode::Started);
        assert_eq!(db.show().unwrap(), Some(id));
        assert_eq!(mode_of(&db, id), RaidMode::Shown);
        assert_eq!(db.active_raid_no(), Some(id));
        assert_eq!(db.close().unwrap(), Some(id));
        assert_eq!(mode_of(&db, id), RaidMode::Closed);

        assert_eq!(db.active_raid_no(), None);
    }

    #[test]
    fn transitions_without_active_raid_are_noops() {
        let db = db();
        let id = db.add_raid("Ony", "Onyxia's Lair").unwrap();
        db.close().unwrap();

        assert_eq!(db.start().unwrap(), None);
        assert_eq!(db.show().unwrap(), None);
        assert_eq!(db.close().unwrap(), None);
        assert_eq!(mode_of(&db, id), RaidMode::Closed);
    }

    #[test]
    fn set_mode_is_unchecked() {
        let db = db();
        let id = db.add_raid("ZG", "Zul'Gurub").unwrap();

        db.set_mode(id, RaidMode::Closed).unwrap();
        db.set_mode(id, RaidMode::Pending).unwrap();
        assert_eq!(mode_of(&db, id), RaidMode::Pending);

        db.set_mode(id, RaidMode::Other(9)).unwrap();
        assert_eq!(mode_of(&db, id), RaidMode::Other(9));
        assert_eq!(db.active_raid_no(), None);

        // unknown id
        db.set_mode(id + 100, RaidMode::Started).unwrap();
    }

    #[test]
    fn close_skips_pending_predecessors() {
        let db = db();
        let id = db.add_raid("AQ40", "Temple of Ahn'Qiraj").unwrap();
        db.close().unwrap();
        assert_eq!(mode_of(&db, id), RaidMode::Closed);
    }

    #[test]
    fn lookup_failure_is_reported() {
        let db = db();
        db.with_conn(|conn| Ok(conn.execute_batch("DROP TABLE raids")?))
            .unwrap();

        assert!(matches!(db.active_raid_lookup(), ActiveRaid::QueryFailed(_)));
        assert_eq!(db.active_raid_no(), None);
    }

    #[test]
    fn get_raid_unknown_id() {
        assert!(db().get_raid(42).unwrap().is_none());
    }
}
