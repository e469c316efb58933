//! Database processors. Every query type is a kanau `Processor` message
//! handled by one of these.

use sqlx::PgPool;

pub struct DatabaseProcessor {
    pub pool: PgPool,
}

/// Owns an open transaction. Dropping it without calling
/// [`commit`](TransactionProcessor::commit) rolls the transaction back.
pub struct TransactionProcessor<'b> {
    pub tx: sqlx::Transaction<'b, sqlx::Postgres>,
}

impl DatabaseProcessor {
    /// Begin a serializable transaction on the pool.
    pub async fn begin_serializable(&self) -> Result<TransactionProcessor<'static>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(TransactionProcessor { tx })
    }
}

impl TransactionProcessor<'_> {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}
