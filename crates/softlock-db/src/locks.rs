use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};
use softlock_types::{Lock, LockRequest, Priority, RaidId, RaidMode};
use tracing::{debug, info, warn};

use crate::models::{LOCK_COLUMNS, lock_from_row, priority_from_sql, priority_to_sql};
use crate::{Database, RegistryError, Result};

impl Database {
    /// `raid` if given, else the active raid.
    fn resolve_raid(&self, raid: Option<RaidId>) -> Option<RaidId> {
        raid.or_else(|| self.active_raid_no())
    }

    // -- Operator path --

    /// All locks of a raid keyed by user name. Empty when no raid is active.
    pub fn get_locks(
        &self,
        raid: Option<RaidId>,
    ) -> Result<HashMap<String, (Priority, Priority)>> {
        let Some(raid_id) = self.resolve_raid(raid) else {
            return Ok(HashMap::new());
        };

        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_name, prio1, prio2 FROM locks WHERE raid_id = ?1")?;
            let locks = stmt
                .query_map([raid_id], |row| {
                    let prio1 = priority_from_sql(row.get_ref(1)?);
                    let prio2 = priority_from_sql(row.get_ref(2)?);
                    Ok((row.get::<_, String>(0)?, (prio1, prio2)))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(locks)
        })
    }

    /// Records `name`'s priorities on a raid, replacing any previous pair.
    /// The lock is left non-editable either way. Returns the raid written to.
    pub fn set_lock(
        &self,
        name: &str,
        prio1: impl Into<Priority>,
        prio2: impl Into<Priority>,
        raid: Option<RaidId>,
    ) -> Result<RaidId> {
        let raid_id = self.resolve_raid(raid).ok_or(RegistryError::NoActiveRaid)?;
        let (prio1, prio2) = (prio1.into(), prio2.into());

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO locks (raid_id, user_name, prio1, prio2, editable)
                 VALUES (?1, ?2, ?3, ?4, 0)
                 ON CONFLICT(raid_id, user_name)
                 DO UPDATE SET prio1 = excluded.prio1, prio2 = excluded.prio2, editable = 0",
                params![raid_id, name, priority_to_sql(&prio1), priority_to_sql(&prio2)],
            )?;
            Ok(())
        })?;

        debug!("Lock set on raid {}: {} -> ({}, {})", raid_id, name, prio1, prio2);
        Ok(raid_id)
    }

    /// Deletes `name`'s lock. Returns whether there was one.
    pub fn remove_lock(&self, name: &str, raid: Option<RaidId>) -> Result<bool> {
        let Some(raid_id) = self.resolve_raid(raid) else {
            warn!("No active raid, lock of {} not removed", name);
            return Ok(false);
        };

        let removed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM locks WHERE raid_id = ?1 AND user_name = ?2",
                params![raid_id, name],
            )?)
        })?;

        debug!("Lock removed from raid {}: {} ({} rows)", raid_id, name, removed);
        Ok(removed > 0)
    }

    // -- Self-service path --

    pub fn lock_count(&self, raid_id: RaidId) -> Result<u64> {
        self.with_conn(|conn| Ok(count_locks(conn, raid_id)?))
    }

    /// Registers a new editable lock for a raid member.
    ///
    /// The raid must exist and be started. Fails with
    /// [`RegistryError::CapacityReached`] once the raid holds `lock_capacity`
    /// locks and with [`RegistryError::AlreadyRegistered`] if the member
    /// already has one. Registered locks stay editable until an operator
    /// overwrites them with [`Database::set_lock`].
    pub fn register_lock(&self, raid_id: RaidId, req: &LockRequest) -> Result<()> {
        let capacity = self.config().lock_capacity;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_accepting(&tx, raid_id)?;

            if count_locks(&tx, raid_id)? >= capacity {
                return Err(RegistryError::CapacityReached { raid_id, capacity });
            }

            let exists = tx
                .query_row(
                    "SELECT 1 FROM locks WHERE raid_id = ?1 AND user_name = ?2",
                    params![raid_id, req.user_name],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Err(RegistryError::AlreadyRegistered {
                    raid_id,
                    user: req.user_name.clone(),
                });
            }

            tx.execute(
                "INSERT INTO locks
                     (raid_id, user_name, class, specialization, prio1, prio2, editable)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
                params![
                    raid_id,
                    req.user_name,
                    req.class,
                    req.specialization,
                    priority_to_sql(&req.prio1),
                    priority_to_sql(&req.prio2),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        info!("{} registered on raid {}", req.user_name, raid_id);
        Ok(())
    }

    /// The member's own lock, as long as it can still be edited.
    pub fn get_user_lock(&self, raid_id: RaidId, user: &str) -> Result<Option<Lock>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM locks WHERE raid_id = ?1 AND user_name = ?2 AND editable != 0",
                LOCK_COLUMNS
            );
            let lock = conn
                .query_row(&sql, params![raid_id, user], lock_from_row)
                .optional()?;
            Ok(lock)
        })
    }

    /// Withdraws a member's editable lock while the raid is still started.
    pub fn cancel_lock(&self, raid_id: RaidId, user: &str) -> Result<()> {
        let removed = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_accepting(&tx, raid_id)?;
            let removed = tx.execute(
                "DELETE FROM locks WHERE raid_id = ?1 AND user_name = ?2 AND editable != 0",
                params![raid_id, user],
            )?;
            tx.commit()?;
            Ok(removed)
        })?;

        if removed == 0 {
            return Err(RegistryError::CancellationRefused {
                raid_id,
                user: user.to_string(),
            });
        }
        info!("{} cancelled their lock on raid {}", user, raid_id);
        Ok(())
    }

    pub fn list_raid_locks(&self, raid_id: RaidId) -> Result<Vec<Lock>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM locks WHERE raid_id = ?1 ORDER BY user_name",
                LOCK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([raid_id], lock_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Members may only change their locks on an existing, started raid.
fn ensure_accepting(conn: &Connection, raid_id: RaidId) -> Result<()> {
    let mode = conn
        .query_row("SELECT mode FROM raids WHERE raid_id = ?1", [raid_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?
        .map(RaidMode::from)
        .ok_or(RegistryError::RaidNotFound(raid_id))?;

    if !mode.accepts_registrations() {
        return Err(RegistryError::RegistrationClosed { raid_id, mode });
    }
    Ok(())
}

fn count_locks(conn: &Connection, raid_id: RaidId) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM locks WHERE raid_id = ?1", [raid_id], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n.max(0) as u64)
}
