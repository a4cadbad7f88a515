use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db::traits::{FeeLedgerDatabase, InsertResult},
    db_types::{BidId, NewOrder, Order, OrderId, UserId},
    fpe_api::{errors::FeeEngineError, objects::CreateOrderResponse},
};

/// `OrderApi` opens the orders that platform fees are paid against.
pub struct OrderApi<B> {
    db: B,
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderApi<B>
where B: FeeLedgerDatabase
{
    /// Opens the platform fee order for `bid_id` on behalf of `caller_id`, who must be the bid's fee payer.
    ///
    /// Safe to retry, and safe to call concurrently: a repeated idempotency key returns the original order, and while
    /// an order for the bid is pending every caller gets that order back.
    pub async fn create_order(
        &self,
        bid_id: &BidId,
        caller_id: &UserId,
        idempotency_key: &str,
    ) -> Result<CreateOrderResponse, FeeEngineError> {
        let idempotency_key = idempotency_key.trim();
        if idempotency_key.is_empty() {
            return Err(FeeEngineError::InvalidArgument("An idempotency key is required".to_string()));
        }
        if bid_id.as_str().trim().is_empty() || caller_id.as_str().trim().is_empty() {
            return Err(FeeEngineError::InvalidArgument("Both a bid id and a caller id are required".to_string()));
        }
        let order = NewOrder {
            order_id: OrderId::random(),
            bid_id: bid_id.clone(),
            caller_id: caller_id.clone(),
            idempotency_key: idempotency_key.to_string(),
            created_at: Utc::now(),
        };
        let result = self.db.create_or_reuse_order(order).await?;
        match &result {
            InsertResult::Inserted(o) => info!("🧾️ Order {} opened for bid {} ({})", o.order_id, o.bid_id, o.amount),
            InsertResult::AlreadyExists(o) => debug!("🧾️ Reusing order {} for bid {}", o.order_id, o.bid_id),
        }
        let reused = result.is_reused();
        let order = result.into_record();
        Ok(CreateOrderResponse { order_id: order.order_id, amount: order.amount, reused })
    }

    /// Fetches an order. Only the order's payer may see it.
    pub async fn get_order(&self, order_id: &OrderId, caller_id: &UserId) -> Result<Order, FeeEngineError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| FeeEngineError::OrderNotFound(order_id.clone()))?;
        if &order.payer_id != caller_id {
            warn!("🧾️ {caller_id} asked for order {order_id}, which belongs to {}", order.payer_id);
            return Err(FeeEngineError::PermissionDenied(format!("Order {order_id} does not belong to {caller_id}")));
        }
        Ok(order)
    }

    pub async fn list_pending_orders(&self, caller_id: &UserId) -> Result<Vec<Order>, FeeEngineError> {
        self.db.fetch_pending_orders_for_payer(caller_id).await
    }

    /// Expires pending orders older than `max_age` that have no evidence waiting for a decision.
    pub async fn expire_stale_orders(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, FeeEngineError> {
        let expired = self.db.expire_stale_orders(now - max_age, now).await?;
        if !expired.is_empty() {
            info!("🧾️ Expired {} abandoned orders", expired.len());
        }
        Ok(expired)
    }
}
