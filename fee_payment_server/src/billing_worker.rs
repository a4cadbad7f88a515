use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use fee_payment_engine::{db_types::Order, BillingApi, OrderApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the billing worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval` the worker advances the billing clock on unpaid contracts, and expires orders that have been
/// pending for longer than `order_expiry`.
pub fn start_billing_worker(
    billing: BillingApi<SqliteDatabase>,
    orders: OrderApi<SqliteDatabase>,
    interval: StdDuration,
    order_expiry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Billing worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            let now = Utc::now();
            info!("🕰️ Running billing cycle");
            match billing.run_billing_cycle(now).await {
                Ok(report) => {
                    info!("🕰️ Billing cycle complete: {report}");
                    for (contract_id, reason) in &report.failures {
                        warn!("🕰️ Contract {contract_id} was not billed: {reason}");
                    }
                },
                Err(e) => error!("🕰️ Error running billing cycle: {e}"),
            }
            match orders.expire_stale_orders(order_expiry, now).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No stale orders"),
                Ok(expired) => info!("🕰️ {} stale orders expired: {}", expired.len(), order_list(&expired)),
                Err(e) => error!("🕰️ Error expiring stale orders: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("order_id: {} bid_id: {}", o.order_id, o.bid_id))
        .collect::<Vec<String>>()
        .join(", ")
}
