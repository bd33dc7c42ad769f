//! Transaction scoping for core operations.
//!
//! Every write path of the core runs inside [`run_in_transaction`]: the handle
//! is opened for the duration of one call, passed explicitly to the body, and
//! committed on success or rolled back on any error. A panic inside the body
//! drops the handle, and store implementations roll back on drop.

use crate::error::InventoryError;
use crate::store::{InventoryStore, StoreTransaction};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (not supported by PostgreSQL, maps to ReadCommitted)
    ReadUncommitted,
    /// Read committed (default)
    #[default]
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    /// Convert to PostgreSQL SQL syntax
    pub(crate) fn to_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Run `body` in a fresh transaction, committing on `Ok` and rolling back on `Err`.
///
/// A failed commit is reported through the usual classification, so a
/// uniqueness violation detected at commit time surfaces as a conflict. When
/// the rollback after an error itself fails, the original error is returned
/// and the rollback failure is logged.
pub fn run_in_transaction<S, T, F>(store: &S, operation: &'static str, body: F) -> Result<T, InventoryError>
where
    S: InventoryStore + ?Sized,
    F: FnOnce(&mut S::Transaction) -> Result<T, InventoryError>,
{
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::transaction_span(operation).entered();
    #[cfg(feature = "metrics")]
    let start = Instant::now();

    let mut tx = store.begin()?;
    let result = match body(&mut tx) {
        Ok(value) => tx.commit().map(|()| value).map_err(InventoryError::from),
        Err(err) => {
            log::debug!("{operation}: rolling back after {err}");
            if let Err(rollback_err) = tx.rollback() {
                log::error!("{operation}: rollback failed after {err}: {rollback_err}");
            }
            Err(err)
        }
    };

    #[cfg(feature = "metrics")]
    METRICS.record_transaction(start.elapsed(), result.is_ok());

    result
}
