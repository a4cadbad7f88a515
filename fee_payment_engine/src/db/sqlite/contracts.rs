use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{BidId, Contract, ContractId, NewContract, ReminderTag, UserId},
    fpe_api::errors::FeeEngineError,
};

pub async fn fetch_contract(
    contract_id: &ContractId,
    conn: &mut SqliteConnection,
) -> Result<Option<Contract>, FeeEngineError> {
    let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE contract_id = $1")
        .bind(contract_id)
        .fetch_optional(conn)
        .await?;
    Ok(contract)
}

pub async fn fetch_for_bid(bid_id: &BidId, conn: &mut SqliteConnection) -> Result<Option<Contract>, FeeEngineError> {
    let contract = sqlx::query_as::<_, Contract>("SELECT * FROM contracts WHERE bid_id = $1")
        .bind(bid_id)
        .fetch_optional(conn)
        .await?;
    Ok(contract)
}

pub async fn insert_contract(contract: &NewContract, conn: &mut SqliteConnection) -> Result<Contract, FeeEngineError> {
    trace!("📑️ Inserting contract {} for bid {}", contract.contract_id, contract.bid_id);
    let contract = sqlx::query_as::<_, Contract>(
        r#"
            INSERT INTO contracts (
                contract_id,
                bid_id,
                listing_type,
                listing_owner_id,
                bidder_id,
                agreed_price,
                platform_fee_payer_id,
                platform_fee,
                billing_started_at,
                platform_fee_due_date,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *;
        "#,
    )
    .bind(&contract.contract_id)
    .bind(&contract.bid_id)
    .bind(contract.listing_type)
    .bind(&contract.listing_owner_id)
    .bind(&contract.bidder_id)
    .bind(contract.agreed_price)
    .bind(&contract.platform_fee_payer_id)
    .bind(contract.platform_fee)
    .bind(contract.billing_started_at)
    .bind(contract.due_date)
    .bind(contract.created_at)
    .fetch_one(conn)
    .await?;
    Ok(contract)
}

/// Unpaid contracts with a running billing clock, oldest first.
pub async fn fetch_billable(conn: &mut SqliteConnection) -> Result<Vec<Contract>, FeeEngineError> {
    let contracts = sqlx::query_as::<_, Contract>(
        r#"
            SELECT * FROM contracts
            WHERE platform_fee_paid = 0
              AND billing_started_at IS NOT NULL
              AND status NOT IN ('cancelled', 'draft')
            ORDER BY billing_started_at ASC;
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(contracts)
}

/// Writes the payment-related fields and status of a contract that has just been activated.
pub async fn save_activation(contract: &Contract, conn: &mut SqliteConnection) -> Result<Contract, FeeEngineError> {
    let contract = sqlx::query_as::<_, Contract>(
        r#"
            UPDATE contracts SET
                platform_fee_paid = $1,
                platform_fee_status = $2,
                platform_fee_order_id = $3,
                status = $4,
                updated_at = $5
            WHERE contract_id = $6
            RETURNING *;
        "#,
    )
    .bind(contract.platform_fee_paid)
    .bind(contract.platform_fee_status)
    .bind(&contract.platform_fee_order_id)
    .bind(contract.status)
    .bind(contract.updated_at)
    .bind(&contract.contract_id)
    .fetch_one(conn)
    .await?;
    Ok(contract)
}

pub async fn record_reminders(
    contract_id: &ContractId,
    reminders: &[ReminderTag],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Contract, FeeEngineError> {
    let contract = sqlx::query_as::<_, Contract>(
        "UPDATE contracts SET platform_fee_reminders = $1, updated_at = $2 WHERE contract_id = $3 RETURNING *",
    )
    .bind(Json(reminders))
    .bind(now)
    .bind(contract_id)
    .fetch_one(conn)
    .await?;
    Ok(contract)
}

pub async fn mark_overdue(
    contract_id: &ContractId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Contract, FeeEngineError> {
    let contract = sqlx::query_as::<_, Contract>(
        "UPDATE contracts SET platform_fee_status = 'overdue', updated_at = $1 WHERE contract_id = $2 RETURNING *",
    )
    .bind(now)
    .bind(contract_id)
    .fetch_one(conn)
    .await?;
    Ok(contract)
}

/// The number of the payer's contracts whose fee is still overdue.
pub async fn count_overdue_for_payer(payer_id: &UserId, conn: &mut SqliteConnection) -> Result<i64, FeeEngineError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
            SELECT COUNT(*) FROM contracts
            WHERE platform_fee_payer_id = $1 AND platform_fee_status = 'overdue' AND status != 'cancelled';
        "#,
    )
    .bind(payer_id)
    .fetch_one(conn)
    .await?;
    Ok(count)
}
