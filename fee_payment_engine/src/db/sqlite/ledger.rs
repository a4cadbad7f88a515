use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{BidId, Centavos, ContractId, LedgerEntry, OrderId, SubmissionId},
    fpe_api::errors::FeeEngineError,
};

pub const LEDGER_COMPLETED: &str = "completed";

pub async fn fetch_completed_for_bid(
    bid_id: &BidId,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, FeeEngineError> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM platform_fee_ledger WHERE bid_id = $1 AND status = $2 LIMIT 1",
    )
    .bind(bid_id)
    .bind(LEDGER_COMPLETED)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

pub async fn fetch_for_bid(bid_id: &BidId, conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>, FeeEngineError> {
    let entries = sqlx::query_as::<_, LedgerEntry>("SELECT * FROM platform_fee_ledger WHERE bid_id = $1 ORDER BY id")
        .bind(bid_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// Appends a completed fee payment. A second completed entry for the same bid violates a unique index.
pub async fn insert_completed(
    bid_id: &BidId,
    order_id: &OrderId,
    submission_id: &SubmissionId,
    contract_id: &ContractId,
    amount: Centavos,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, FeeEngineError> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
            INSERT INTO platform_fee_ledger (bid_id, order_id, submission_id, contract_id, amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(bid_id)
    .bind(order_id)
    .bind(submission_id)
    .bind(contract_id)
    .bind(amount)
    .bind(LEDGER_COMPLETED)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}
