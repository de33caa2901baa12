use std::io::Write;

use anyhow::{Result, bail};
use clap::Subcommand;
use serde::Serialize;
use softlock_db::Database;
use softlock_types::{ActiveRaid, Priority, RaidId, RaidMode};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new pending raid
    AddRaid { name: String, dungeon: String },
    /// Print the id of the active raid
    Active,
    /// List all raids
    Raids,
    /// Open the active raid for locks
    Start,
    /// Publish the locks of the active raid
    Show,
    /// Close the active raid
    Close,
    /// Overwrite the mode of a raid (0 pending, 1 started, 2 shown, 3 closed)
    SetMode {
        raid_id: RaidId,
        #[arg(allow_negative_numbers = true)]
        mode: i64,
    },
    /// List the locks of a raid
    Locks {
        #[arg(long)]
        raid: Option<RaidId>,
        #[arg(long)]
        json: bool,
    },
    /// Record a user's priorities, replacing any previous ones
    SetLock {
        name: String,
        prio1: String,
        prio2: String,
        #[arg(long)]
        raid: Option<RaidId>,
    },
    /// Delete a user's lock
    RemoveLock {
        name: String,
        #[arg(long)]
        raid: Option<RaidId>,
    },
}

#[derive(Serialize)]
struct LockLine<'a> {
    user_name: &'a str,
    prio1: &'a Priority,
    prio2: &'a Priority,
}

pub fn run(db: &Database, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::AddRaid { name, dungeon } => {
            let id = db.add_raid(&name, &dungeon)?;
            writeln!(out, "{}", id)?;
        }
        Command::Active => match db.active_raid_lookup() {
            ActiveRaid::Found(id) => writeln!(out, "{}", id)?,
            ActiveRaid::NotFound => writeln!(out, "no active raid")?,
            ActiveRaid::QueryFailed(cause) => bail!("active raid lookup failed: {}", cause),
        },
        Command::Raids => {
            for raid in db.list_raids()? {
                let date = raid
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into());
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}",
                    raid.id, date, raid.mode, raid.name, raid.dungeon
                )?;
            }
        }
        Command::Start => report_transition(out, db.start()?, RaidMode::Started)?,
        Command::Show => report_transition(out, db.show()?, RaidMode::Shown)?,
        Command::Close => report_transition(out, db.close()?, RaidMode::Closed)?,
        Command::SetMode { raid_id, mode } => db.set_mode(raid_id, RaidMode::from(mode))?,
        Command::Locks { raid, json } => {
            let locks = db.get_locks(raid)?;
            let mut names: Vec<&String> = locks.keys().collect();
            names.sort();

            if json {
                let lines: Vec<LockLine<'_>> = names
                    .iter()
                    .map(|name| {
                        let (prio1, prio2) = &locks[*name];
                        LockLine {
                            user_name: name,
                            prio1,
                            prio2,
                        }
                    })
                    .collect();
                serde_json::to_writer_pretty(&mut *out, &lines)?;
                writeln!(out)?;
            } else {
                for name in names {
                    let (prio1, prio2) = &locks[name];
                    writeln!(out, "{}\t{}\t{}", name, prio1, prio2)?;
                }
            }
        }
        Command::SetLock { name, prio1, prio2, raid } => {
            let (prio1, prio2) = (Priority::parse(&prio1), Priority::parse(&prio2));
            let raid_id = db.set_lock(&name, prio1, prio2, raid)?;
            writeln!(out, "{} -> raid {}", name, raid_id)?;
        }
        Command::RemoveLock { name, raid } => {
            if !db.remove_lock(&name, raid)? {
                writeln!(out, "{} holds no lock", name)?;
            }
        }
    }
    Ok(())
}

fn report_transition(out: &mut impl Write, raid: Option<RaidId>, mode: RaidMode) -> Result<()> {
    match raid {
        Some(id) => writeln!(out, "raid {} is now {}", id, mode)?,
        None => writeln!(out, "no active raid")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(db: &Database, command: Command) -> String {
        let mut out = Vec::new();
        run(db, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn control_session() {
        let db = Database::open_in_memory().unwrap();

        let add = Command::AddRaid {
            name: "Naxx".into(),
            dungeon: "Naxxramas".into(),
        };
        let id = exec(&db, add);
        assert_eq!(id.trim(), "1");
        assert_eq!(exec(&db, Command::Active).trim(), "1");

        let set_lock = Command::SetLock {
            name: "bob".into(),
            prio1: "3".into(),
            prio2: "Ashkandi".into(),
            raid: None,
        };
        exec(&db, set_lock);
        let list = Command::Locks {
            raid: None,
            json: false,
        };
        let locks = exec(&db, list);
        assert_eq!(locks, "bob\t3\tAshkandi\n");

        assert_eq!(exec(&db, Command::Start).trim(), "raid 1 is now started");
        assert_eq!(exec(&db, Command::Close).trim(), "raid 1 is now closed");
        assert_eq!(exec(&db, Command::Active).trim(), "no active raid");
        assert_eq!(exec(&db, Command::Show).trim(), "no active raid");
    }

    #[test]
    fn locks_as_json() {
        let db = Database::open_in_memory().unwrap();
        let raid = db.add_raid("MC", "Molten Core").unwrap();
        db.set_lock("alice", 1, 2, Some(raid)).unwrap();

        let list = Command::Locks {
            raid: Some(raid),
            json: true,
        };
        let out = exec(&db, list);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["user_name"], "alice");
        assert_eq!(parsed[0]["prio1"], 1);
        assert_eq!(parsed[0]["prio2"], 2);
    }

    #[test]
    fn remove_missing_lock() {
        let db = Database::open_in_memory().unwrap();
        db.add_raid("MC", "Molten Core").unwrap();
        let remove = Command::RemoveLock {
            name: "ghost".into(),
            raid: None,
        };
        let out = exec(&db, remove);
        assert_eq!(out.trim(), "ghost holds no lock");
    }

    #[test]
    fn set_lock_without_raid_fails() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        let cmd = Command::SetLock {
            name: "bob".into(),
            prio1: "1".into(),
            prio2: "2".into(),
            raid: None,
        };
        assert!(run(&db, cmd, &mut out).is_err());
    }
}
