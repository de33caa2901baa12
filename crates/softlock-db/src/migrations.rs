use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (raids and locks)");
        // IF NOT EXISTS: databases written by the control script or the web
        // backend have the tables but no schema_version row. v2 reconciles
        // their columns.
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS raids (
                raid_id     INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                dungeon     TEXT NOT NULL,
                date        TEXT,
                mode        INTEGER NOT NULL DEFAULT 0
            );

            -- prio columns are declared without a type so integers and item
            -- names are stored as given
            CREATE TABLE IF NOT EXISTS locks (
                raid_id         INTEGER,
                user_name       TEXT NOT NULL,
                prio1,
                prio2,
                editable        INTEGER NOT NULL DEFAULT 1,
                UNIQUE(raid_id, user_name)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (lock registration details)");
        migrate_v2(conn)?;
    }

    info!("Database migrations complete");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    let raids = columns(conn, "raids")?;
    if has_column(&raids, "instance") && !has_column(&raids, "dungeon") {
        info!("Renaming raids.instance to raids.dungeon");
        conn.execute_batch("ALTER TABLE raids RENAME COLUMN instance TO dungeon;")?;
    }

    let locks = columns(conn, "locks")?;
    let class_required = locks.iter().any(|c| c.name == "class" && c.not_null);
    if class_required {
        // The web backend declared class/specialization NOT NULL and typed the
        // prio columns, which operator writes cannot satisfy.
        info!("Rebuilding locks table from web backend schema");
        conn.execute_batch(
            "
            CREATE TABLE locks_v2 (
                raid_id         INTEGER,
                user_name       TEXT NOT NULL,
                prio1,
                prio2,
                editable        INTEGER NOT NULL DEFAULT 1,
                class           TEXT,
                specialization  TEXT,
                UNIQUE(raid_id, user_name)
            );

            INSERT INTO locks_v2
                (raid_id, user_name, prio1, prio2, editable, class, specialization)
            SELECT raid_id, user_name, prio1, prio2, COALESCE(editable, 1), class, specialization
            FROM locks;

            DROP TABLE locks;
            ALTER TABLE locks_v2 RENAME TO locks;
            ",
        )?;
    } else {
        if !has_column(&locks, "class") {
            conn.execute_batch("ALTER TABLE locks ADD COLUMN class TEXT;")?;
        }
        if !has_column(&locks, "specialization") {
            conn.execute_batch("ALTER TABLE locks ADD COLUMN specialization TEXT;")?;
        }
    }

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_locks_raid ON locks(raid_id);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;
    Ok(())
}

struct Column {
    name: String,
    not_null: bool,
}

fn columns(conn: &Connection, table: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare("SELECT name, \"notnull\" FROM pragma_table_info(?1)")?;
    let cols = stmt
        .query_map([table], |row| {
            Ok(Column {
                name: row.get(0)?,
                not_null: row.get::<_, i64>(1)? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(cols)
}

fn has_column(cols: &[Column], name: &str) -> bool {
    cols.iter().any(|c| c.name == name)
}
