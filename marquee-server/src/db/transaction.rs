//! Explicit transaction scope around a single pooled connection.
//!
//! A handler that mutates several tables opens a [`TxScope`], runs its
//! statements against [`TxScope::conn`] and hands the outcome to
//! [`TxScope::finish`], which commits or rolls back and then always releases
//! the connection:
//!
//! * `Ok` commits. If the commit fails the transaction is rolled back unless
//!   the failure means the database is unreachable.
//! * `Err` rolls back, again skipping the rollback when the error says the
//!   database is unavailable.
//! * Rollback and release failures are logged and never replace the error
//!   that caused them.
//!
//! Connections whose state is unknown (availability failures, failed
//! rollbacks, scopes dropped without `finish`) are closed instead of being
//! returned to the pool.

use sqlx::{PgConnection, PgPool, Postgres, pool::PoolConnection};
use tracing::{debug, error, warn};

use crate::infra::errors::{AppError, AppResult, is_availability_error};

#[derive(Debug)]
pub struct TxScope {
    conn: PoolConnection<Postgres>,
    label: &'static str,
    state: ScopeState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Open,
    /// Finished cleanly; the connection goes back to the pool.
    Release,
    /// Finished, but the connection state is unknown; close it.
    Close,
}

/// What happened to a scope when it was finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    RolledBack,
    RollbackSkipped,
    RollbackFailed,
}

impl TxOutcome {
    fn connection_reusable(self) -> bool {
        matches!(self, TxOutcome::Committed | TxOutcome::RolledBack)
    }
}

impl TxScope {
    pub async fn begin(pool: &PgPool, label: &'static str) -> AppResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN").execute(&mut *conn).await?;
        debug!(scope = label, "transaction started");
        Ok(Self {
            conn,
            label,
            state: ScopeState::Open,
        })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Commit or roll back according to `result`, then release the
    /// connection. The returned value is `result` unless the commit itself
    /// failed.
    pub async fn finish<T>(mut self, result: AppResult<T>) -> AppResult<T> {
        let label = self.label;

        let (outcome, result) = match result {
            Ok(value) => match sqlx::query("COMMIT").execute(&mut *self.conn).await {
                Ok(_) => (TxOutcome::Committed, Ok(value)),
                Err(commit_err) => {
                    error!(scope = label, error = %commit_err, "transaction commit failed");
                    let outcome = if is_availability_error(&commit_err) {
                        TxOutcome::RollbackSkipped
                    } else {
                        rollback(&mut self.conn, label).await
                    };
                    (outcome, Err(AppError::from(commit_err)))
                }
            },
            Err(err) => {
                let outcome = if skips_rollback(&err) {
                    TxOutcome::RollbackSkipped
                } else {
                    rollback(&mut self.conn, label).await
                };
                (outcome, Err(err))
            }
        };

        match outcome {
            TxOutcome::Committed => debug!(scope = label, "transaction committed"),
            TxOutcome::RolledBack => debug!(scope = label, "transaction rolled back"),
            TxOutcome::RollbackSkipped => {
                warn!(scope = label, "database unavailable; rollback skipped")
            }
            TxOutcome::RollbackFailed => {}
        }

        self.state = if outcome.connection_reusable() {
            ScopeState::Release
        } else {
            ScopeState::Close
        };
        result
    }
}

/// Errors that leave the connection unusable; a rollback would only hang.
fn skips_rollback(err: &AppError) -> bool {
    err.db_unavailable
}

async fn rollback(conn: &mut PgConnection, label: &'static str) -> TxOutcome {
    match sqlx::query("ROLLBACK").execute(conn).await {
        Ok(_) => TxOutcome::RolledBack,
        Err(rollback_err) => {
            error!(scope = label, error = %rollback_err, "transaction rollback failed");
            TxOutcome::RollbackFailed
        }
    }
}

impl Drop for TxScope {
    fn drop(&mut self) {
        match self.state {
            ScopeState::Release => {}
            ScopeState::Close => self.conn.close_on_drop(),
            ScopeState::Open => {
                warn!(
                    scope = self.label,
                    "transaction scope dropped without finish; closing connection"
                );
                self.conn.close_on_drop();
            }
        }
        debug!(scope = self.label, "transaction connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_clean_outcomes_reuse_the_connection() {
        assert!(TxOutcome::Committed.connection_reusable());
        assert!(TxOutcome::RolledBack.connection_reusable());
        assert!(!TxOutcome::RollbackSkipped.connection_reusable());
        assert!(!TxOutcome::RollbackFailed.connection_reusable());
    }

    #[test]
    fn availability_failures_skip_the_rollback() {
        assert!(skips_rollback(&AppError::from(sqlx::Error::PoolTimedOut)));
        assert!(skips_rollback(&AppError::from(sqlx::Error::PoolClosed)));
        assert!(skips_rollback(&AppError::unavailable("down")));

        assert!(!skips_rollback(&AppError::from(sqlx::Error::RowNotFound)));
        assert!(!skips_rollback(&AppError::not_found("director does not exist")));
        assert!(!skips_rollback(&AppError::conflict("duplicate")));
    }
}
