pub mod error;
pub mod locks;
pub mod migrations;
pub mod models;
pub mod raids;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

pub use error::{RegistryError, Result};

/// Most locks a single raid accepts through self-service registration.
pub const DEFAULT_LOCK_CAPACITY: u64 = 80;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub lock_capacity: u64,
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            lock_capacity: DEFAULT_LOCK_CAPACITY,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Raid registry backed by a single SQLite connection.
///
/// The handle is owned by the caller and shared by reference; every operation
/// takes the connection for the duration of its statement(s) only.
pub struct Database {
    conn: Mutex<Connection>,
    config: DbConfig,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, DbConfig::default())
    }

    pub fn open_with(path: &Path, config: DbConfig) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn, config)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory registry. Nothing survives the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, DbConfig::default())
    }

    pub fn open_in_memory_with(config: DbConfig) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, config)
    }

    fn init(conn: Connection, config: DbConfig) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(config.busy_timeout)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| RegistryError::LockPoisoned)?;
        f(&conn)
    }

    /// Like [`Database::with_conn`], for callers that need a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| RegistryError::LockPoisoned)?;
        f(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use softlock_types::Priority;

    #[test]
    fn registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.sqlite");

        let id = {
            let db = Database::open(&path).unwrap();
            let id = db.add_raid("Naxx", "Naxxramas").unwrap();
            db.set_lock("bob", 3, 7, None).unwrap();
            id
        };

        let db = Database::open(&path).unwrap();
        assert_eq!(db.active_raid_no(), Some(id));
        let locks = db.get_locks(Some(id)).unwrap();
        assert_eq!(locks.get("bob"), Some(&(Priority::Int(3), Priority::Int(7))));
    }

    #[test]
    fn opens_web_backend_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS raids(raid_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name STRING NOT NULL, instance STRING NOT NULL, mode INTEGER DEFAULT 0,
                    date STRING);
                CREATE TABLE IF NOT EXISTS locks(raid_id INTEGER, user_name STRING NOT NULL,
                    class STRING NOT NULL, specialization STRING NOT NULL, prio1 STRING,
                    prio2 STRING, editable INTEGER DEFAULT 1, PRIMARY KEY(raid_id, user_name));
                INSERT INTO raids (name, instance, mode) VALUES ('MC', 'Molten Core', 1);
                INSERT INTO locks (raid_id, user_name, class, specialization, prio1)
                    VALUES (1, 'alice', 'Mage', 'Fire', 'Ring of Spell Power');
                ",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let raid = db.get_raid(1).unwrap().unwrap();
        assert_eq!(raid.dungeon, "Molten Core");
        assert_eq!(raid.date, None);
        assert_eq!(db.active_raid_no(), Some(1));

        db.set_lock("bob", 3, 7, None).unwrap();
        let locks = db.list_raid_locks(1).unwrap();
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0].class.as_deref(), Some("Mage"));
        assert!(locks[0].editable);
        assert_eq!(locks[1].class, None);

        db.cancel_lock(1, "alice").unwrap();
    }

    #[test]
    fn open_applies_config() {
        let config = DbConfig {
            lock_capacity: 3,
            busy_timeout: Duration::from_millis(250),
        };
        let db = Database::open_in_memory_with(config).unwrap();
        assert_eq!(db.config().lock_capacity, 3);
    }
}
