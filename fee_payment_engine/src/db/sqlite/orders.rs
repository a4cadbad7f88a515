use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BidId, Centavos, NewOrder, Order, OrderId, OrderStatusType, SubmissionId, UserId},
    fpe_api::errors::FeeEngineError,
};

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, FeeEngineError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_by_idempotency_key(key: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, FeeEngineError> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// The open order for a bid and payer. There is at most one, which the `orders_single_pending_idx` index enforces.
pub async fn fetch_pending_for_bid_and_payer(
    bid_id: &BidId,
    payer_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, FeeEngineError> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE bid_id = $1 AND payer_id = $2 AND status = 'pending' LIMIT 1",
    )
    .bind(bid_id)
    .bind(payer_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_pending_for_payer(
    payer_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, FeeEngineError> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE payer_id = $1 AND status = 'pending' ORDER BY created_at ASC",
    )
    .bind(payer_id)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Inserts a new pending order. This is not atomic on its own; embed it in a transaction together with the checks
/// that guard it.
pub async fn insert_order(
    order: &NewOrder,
    payer_id: &UserId,
    amount: Centavos,
    conn: &mut SqliteConnection,
) -> Result<Order, FeeEngineError> {
    trace!("🧾️ Inserting order {} for bid {}", order.order_id, order.bid_id);
    let order = sqlx::query_as::<_, Order>(
        r#"
            INSERT INTO orders (order_id, bid_id, payer_id, amount, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.bid_id)
    .bind(payer_id)
    .bind(amount)
    .bind(&order.idempotency_key)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Writes a new status for the order. The caller is responsible for checking that the transition is legal.
pub async fn update_status(
    order_id: &OrderId,
    status: OrderStatusType,
    verified_submission_id: Option<&SubmissionId>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, FeeEngineError> {
    let order = sqlx::query_as::<_, Order>(
        r#"
            UPDATE orders SET
                status = $1,
                verified_submission_id = COALESCE($2, verified_submission_id),
                updated_at = $3
            WHERE order_id = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(verified_submission_id)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    order.ok_or_else(|| FeeEngineError::OrderNotFound(order_id.clone()))
}

/// Pending orders created before `cutoff` with no submission that is still waiting for a decision.
pub async fn fetch_stale_pending(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, FeeEngineError> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
            SELECT * FROM orders o
            WHERE o.status = 'pending'
              AND o.created_at < $1
              AND NOT EXISTS (
                SELECT 1 FROM payment_submissions s
                WHERE s.order_id = o.order_id AND s.status IN ('pending', 'manual_review')
              )
            ORDER BY o.created_at ASC;
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
