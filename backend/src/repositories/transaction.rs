//! Transaction management utilities for repositories.

use crate::error::AppError;
use sqlx::postgres::PgTransaction;
use sqlx::PgPool;

/// Begin a new database transaction.
///
/// The returned handle owns its connection, so it can outlive the borrow of `db`.
pub async fn begin_transaction(db: &PgPool) -> Result<PgTransaction<'static>, AppError> {
    db.begin().await.map_err(AppError::persist)
}

/// Commit a transaction.
pub async fn commit_transaction(tx: PgTransaction<'static>) -> Result<(), AppError> {
    tx.commit().await.map_err(AppError::persist)
}
