//! Transaction boundaries for repository operations.

use kgmem_graph::StoreTxn;

use crate::error::Result;

/// Commit `txn` if `outcome` succeeded, otherwise roll it back.
///
/// The operation's own error wins over a rollback failure.
pub async fn finish<T, X: StoreTxn>(txn: X, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = txn.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}
