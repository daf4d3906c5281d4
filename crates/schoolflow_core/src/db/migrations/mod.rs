//! Versioned schema for the document database.
//!
//! # Responsibility
//! - List schema steps in strictly increasing version order.
//! - Bring a connection from its recorded version to the latest one.
//!
//! # Invariants
//! - `PRAGMA user_version` always equals the last applied step.
//! - One run is one transaction; a failing step rolls back the whole run.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

struct SchemaStep {
    version: u32,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        sql: include_str!("0001_documents.sql"),
    },
    SchemaStep {
        version: 2,
        sql: include_str!("0002_documents_updated_index.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Applies every step newer than the connection's recorded version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `Migration` naming the first step that failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let recorded: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if recorded > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: recorded,
            latest_supported: latest,
        });
    }

    let pending = pending_steps(recorded);
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        run_step(&tx, step).map_err(|source| DbError::Migration {
            version: step.version,
            source,
        })?;
        debug!("event=db_migrate module=db status=applied version={}", step.version);
    }
    tx.commit()?;
    info!(
        "event=db_migrate module=db status=ok from={} to={}",
        recorded, latest
    );
    Ok(())
}

fn pending_steps(recorded: u32) -> &'static [SchemaStep] {
    let first_pending = STEPS.partition_point(|step| step.version <= recorded);
    &STEPS[first_pending..]
}

fn run_step(tx: &Transaction<'_>, step: &SchemaStep) -> rusqlite::Result<()> {
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)
}

#[cfg(test)]
mod tests {
    use super::{latest_version, pending_steps, STEPS};

    #[test]
    fn steps_are_strictly_increasing() {
        assert!(STEPS.windows(2).all(|pair| pair[0].version < pair[1].version));
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn pending_steps_start_after_recorded_version() {
        assert_eq!(pending_steps(0).len(), 2);
        assert_eq!(pending_steps(1)[0].version, 2);
        assert!(pending_steps(2).is_empty());
    }
}
