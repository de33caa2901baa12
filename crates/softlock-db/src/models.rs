//! Row mapping between SQLite and the softlock-types models.

use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::{Type, Value, ValueRef};
use softlock_types::{Lock, Priority, Raid, RaidMode};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const RAID_COLUMNS: &str = "raid_id, name, dungeon, date, mode";

pub(crate) const LOCK_COLUMNS: &str =
    "raid_id, user_name, class, specialization, prio1, prio2, editable";

/// Maps a row selected with [`RAID_COLUMNS`].
pub(crate) fn raid_from_row(row: &Row<'_>) -> rusqlite::Result<Raid> {
    let date = row
        .get::<_, Option<String>>(3)?
        .map(|date| NaiveDate::parse_from_str(&date, DATE_FORMAT))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Raid {
        id: row.get(0)?,
        name: row.get(1)?,
        dungeon: row.get(2)?,
        date,
        mode: RaidMode::from(row.get::<_, i64>(4)?),
    })
}

/// Maps a row selected with [`LOCK_COLUMNS`].
pub(crate) fn lock_from_row(row: &Row<'_>) -> rusqlite::Result<Lock> {
    Ok(Lock {
        raid_id: row.get(0)?,
        user_name: row.get(1)?,
        class: row.get(2)?,
        specialization: row.get(3)?,
        prio1: priority_from_sql(row.get_ref(4)?),
        prio2: priority_from_sql(row.get_ref(5)?),
        editable: row.get::<_, i64>(6)? != 0,
    })
}

pub(crate) fn priority_to_sql(prio: &Priority) -> Value {
    match prio {
        Priority::Int(v) => Value::Integer(*v),
        Priority::Text(s) => Value::Text(s.clone()),
        Priority::Empty => Value::Null,
    }
}

/// Reals and blobs only appear if another writer put them there; they are
/// read back as text.
pub(crate) fn priority_from_sql(value: ValueRef<'_>) -> Priority {
    match value {
        ValueRef::Null => Priority::Empty,
        ValueRef::Integer(v) => Priority::Int(v),
        ValueRef::Real(v) => Priority::Text(v.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Priority::Text(String::from_utf8_lossy(t).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_keeps_storage_class() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v)").unwrap();

        for prio in [Priority::Int(3), Priority::Text("Ashkandi".into()), Priority::Empty] {
            conn.execute("DELETE FROM t", []).unwrap();
            conn.execute("INSERT INTO t (v) VALUES (?1)", [priority_to_sql(&prio)])
                .unwrap();
            let back = conn
                .query_row("SELECT v FROM t", [], |r| Ok(priority_from_sql(r.get_ref(0)?)))
                .unwrap();
            assert_eq!(back, prio);
        }
    }

    #[test]
    fn real_priority_reads_as_text() {
        assert_eq!(priority_from_sql(ValueRef::Real(1.5)), Priority::Text("1.5".into()));
    }
}
