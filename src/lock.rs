// src/lock.rs

//! Database-row mutex used to serialize concurrent migration runs.
//!
//! Mirrors the original implementation's `acquire_lock`/`release_lock`/
//! `migration_lock` context manager: a singleton row in `jetbase_lock` is
//! claimed with a conditional `UPDATE ... WHERE is_locked = FALSE` keyed by a
//! per-process UUID, so two processes racing to acquire it can never both
//! succeed. Release is conditioned on the same UUID so a process can never
//! release a lock it does not hold.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::storage::StorageAdapter;
use rusqlite::Transaction;
use tracing::warn;
use uuid::Uuid;

/// Current state of the singleton lock row.
#[derive(Debug, Clone)]
pub struct LockStatus {
    pub is_locked: bool,
    pub locked_at: Option<String>,
    pub process_id: Option<String>,
}

/// Attempts to acquire the migration lock for this process.
///
/// Returns `Err(Error::AlreadyLocked)` if another process currently holds it.
pub fn acquire(tx: &Transaction<'_>, dialect: &dyn Dialect, process_id: &Uuid) -> Result<()> {
    tx.execute(
        &dialect.initialize_lock_record_stmt(),
        [],
    )?;

    let rows_changed = tx.execute(
        &dialect.acquire_lock_stmt(),
        rusqlite::named_params! {
            ":locked_at": now_str(),
            ":process_id": process_id.to_string(),
        },
    )?;

    if rows_changed == 0 {
        return Err(Error::AlreadyLocked);
    }
    Ok(())
}

/// Releases the migration lock, but only if it is still held by `process_id`.
pub fn release(tx: &Transaction<'_>, dialect: &dyn Dialect, process_id: &Uuid) -> Result<()> {
    tx.execute(
        &dialect.release_lock_stmt(),
        rusqlite::named_params! {
            ":process_id": process_id.to_string(),
        },
    )?;
    Ok(())
}

/// Clears the lock row unconditionally, regardless of which process holds it.
pub fn force_unlock(tx: &Transaction<'_>, dialect: &dyn Dialect) -> Result<()> {
    tx.execute(&dialect.force_unlock_stmt(), [])?;
    Ok(())
}

/// Reads the current lock row without modifying it.
pub fn status(tx: &Transaction<'_>, dialect: &dyn Dialect) -> Result<LockStatus> {
    tx.execute(&dialect.initialize_lock_record_stmt(), [])?;
    let status = tx.query_row(&dialect.check_lock_status_stmt(), [], |row| {
        Ok(LockStatus {
            is_locked: row.get::<_, bool>(0)?,
            locked_at: row.get(1)?,
            process_id: row.get(2)?,
        })
    })?;
    Ok(status)
}

/// Holds the migration lock for as long as it lives, releasing it on every
/// exit path via `Drop` — success, early return, or panic unwinding.
///
/// Grounded on the sibling Conary lineage's `SystemLock`, whose file lock is
/// likewise released from a `Drop` impl rather than relying on callers to
/// remember to unlock.
pub struct LockGuard<'a> {
    storage: &'a mut StorageAdapter,
    process_id: Uuid,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(storage: &'a mut StorageAdapter) -> Result<Self> {
        let process_id = Uuid::new_v4();
        storage.run(|tx, dialect| acquire(tx, dialect, &process_id))?;
        Ok(Self {
            storage,
            process_id,
            released: false,
        })
    }

    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.storage
            .run(|tx, dialect| release(tx, dialect, &self.process_id))
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(error = %e, "failed to release migration lock on drop");
        }
    }
}

fn now_str() -> String {
    // RFC 3339 rather than a raw epoch integer: SQLite's NUMERIC column
    // affinity on `locked_at` silently coerces a pure-digit string to an
    // INTEGER storage class, which then fails to read back as a String.
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&SqliteDialect.create_lock_table_stmt())
            .unwrap();
        conn
    }

    #[test]
    fn acquire_then_release_round_trips() {
        let mut conn = setup();
        let pid = Uuid::new_v4();
        let tx = conn.transaction().unwrap();
        acquire(&tx, &SqliteDialect, &pid).unwrap();
        let st = status(&tx, &SqliteDialect).unwrap();
        assert!(st.is_locked);
        release(&tx, &SqliteDialect, &pid).unwrap();
        let st = status(&tx, &SqliteDialect).unwrap();
        assert!(!st.is_locked);
        tx.commit().unwrap();
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let mut conn = setup();
        let pid_a = Uuid::new_v4();
        let pid_b = Uuid::new_v4();
        let tx = conn.transaction().unwrap();
        acquire(&tx, &SqliteDialect, &pid_a).unwrap();
        let err = acquire(&tx, &SqliteDialect, &pid_b).unwrap_err();
        assert!(matches!(err, Error::AlreadyLocked));
        tx.commit().unwrap();
    }

    #[test]
    fn release_with_wrong_process_id_is_a_no_op() {
        let mut conn = setup();
        let pid_a = Uuid::new_v4();
        let pid_b = Uuid::new_v4();
        let tx = conn.transaction().unwrap();
        acquire(&tx, &SqliteDialect, &pid_a).unwrap();
        release(&tx, &SqliteDialect, &pid_b).unwrap();
        let st = status(&tx, &SqliteDialect).unwrap();
        assert!(st.is_locked, "lock must still be held by process a");
        tx.commit().unwrap();
    }

    #[test]
    fn force_unlock_clears_regardless_of_holder() {
        let mut conn = setup();
        let pid = Uuid::new_v4();
        let tx = conn.transaction().unwrap();
        acquire(&tx, &SqliteDialect, &pid).unwrap();
        force_unlock(&tx, &SqliteDialect).unwrap();
        let st = status(&tx, &SqliteDialect).unwrap();
        assert!(!st.is_locked);
        tx.commit().unwrap();
    }
}
