use chrono::{Duration, Utc};
use fee_payment_engine::{
    db_types::{BidId, Centavos, OrderId, OrderStatusType, UserId},
    ErrorCode,
    FeeLedgerDatabase,
};
use futures_util::future::join_all;
use log::*;

mod support;

use support::{receipt, TestSystem};

const CALLERS: usize = 12;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_order() {
    let sys = TestSystem::new().await;
    sys.cargo_contract("bid_burst", "shipper_sam", "trucker_tom", 10_000, Utc::now()).await;
    let bid = BidId::from("bid_burst");
    let payer = UserId::from("trucker_tom");

    let attempts = (0..CALLERS).map(|i| {
        let key = format!("checkout-{i}");
        let (bid, payer, orders) = (&bid, &payer, &sys.orders);
        async move { orders.create_order(bid, payer, &key).await }
    });
    let results = join_all(attempts).await;
    info!("🚀️ {} concurrent order requests complete", results.len());

    let responses = results.into_iter().map(|r| r.expect("Order creation failed")).collect::<Vec<_>>();
    let first = &responses[0].order_id;
    assert!(responses.iter().all(|r| &r.order_id == first), "Callers got different orders");
    assert_eq!(responses.iter().filter(|r| !r.reused).count(), 1);
    assert!(responses.iter().all(|r| r.amount == Centavos::from_pesos(500)));
    let pending = sys.orders.list_pending_orders(&payer).await.unwrap();
    assert_eq!(pending.len(), 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn idempotency_key_replays_the_same_order() {
    let sys = TestSystem::new().await;
    sys.cargo_contract("bid_1", "shipper_sam", "trucker_tom", 10_000, Utc::now()).await;
    let bid = BidId::from("bid_1");
    let payer = UserId::from("trucker_tom");

    let first = sys.orders.create_order(&bid, &payer, "key-1").await.unwrap();
    assert!(!first.reused);
    let again = sys.orders.create_order(&bid, &payer, "key-1").await.unwrap();
    assert!(again.reused);
    assert_eq!(again.order_id, first.order_id);

    let err = sys.orders.create_order(&bid, &"shipper_sam".into(), "key-2").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);
    let err = sys.orders.create_order(&bid, &"shipper_sam".into(), "key-1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);
    let err = sys.orders.create_order(&"bid_missing".into(), &payer, "key-3").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    let err = sys.orders.create_order(&bid, &payer, "   ").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    sys.tear_down().await;
}

#[tokio::test]
async fn orders_are_private_to_their_payer() {
    let sys = TestSystem::new().await;
    sys.cargo_contract("bid_1", "shipper_sam", "trucker_tom", 10_000, Utc::now()).await;
    let payer = UserId::from("trucker_tom");
    let created = sys.orders.create_order(&"bid_1".into(), &payer, "k").await.unwrap();

    let order = sys.orders.get_order(&created.order_id, &payer).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.amount, Centavos::from_pesos(500));
    let err = sys.orders.get_order(&created.order_id, &"shipper_sam".into()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);
    let err = sys.orders.get_order(&OrderId::from("ord_nope"), &payer).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(sys.orders.list_pending_orders(&"shipper_sam".into()).await.unwrap().is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn paid_contracts_refuse_new_orders() {
    let sys = TestSystem::new().await;
    sys.cargo_contract("bid_1", "shipper_sam", "trucker_tom", 10_000, Utc::now()).await;
    let payer = UserId::from("trucker_tom");
    let created = sys.orders.create_order(&"bid_1".into(), &payer, "k1").await.unwrap();
    let sub = sys.verification.submit_evidence(&created.order_id, &payer, "s3://evidence/1.png").await.unwrap();
    let outcome = sys.verification.process_extraction(&sub.submission_id, receipt(created.amount, "7001 234 567")).await;
    assert!(outcome.unwrap().resolution.is_some());

    let err = sys.orders.create_order(&"bid_1".into(), &payer, "k2").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::FailedPrecondition);
    // The original key still replays the verified order
    let replay = sys.orders.create_order(&"bid_1".into(), &payer, "k1").await.unwrap();
    assert!(replay.reused);
    assert_eq!(replay.order_id, created.order_id);
    sys.tear_down().await;
}

#[tokio::test]
async fn abandoned_orders_expire() {
    let sys = TestSystem::new().await;
    sys.cargo_contract("bid_1", "shipper_sam", "trucker_tom", 10_000, Utc::now()).await;
    sys.cargo_contract("bid_2", "shipper_sam", "trucker_tom", 20_000, Utc::now()).await;
    let payer = UserId::from("trucker_tom");
    let abandoned = sys.orders.create_order(&"bid_1".into(), &payer, "k1").await.unwrap();
    let in_review = sys.orders.create_order(&"bid_2".into(), &payer, "k2").await.unwrap();
    sys.verification.submit_evidence(&in_review.order_id, &payer, "s3://evidence/2.png").await.unwrap();

    let later = Utc::now() + Duration::hours(49);
    let expired = sys.orders.expire_stale_orders(Duration::hours(48), later).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].order_id, abandoned.order_id);
    assert_eq!(expired[0].status, OrderStatusType::Expired);

    let order = sys.orders.get_order(&in_review.order_id, &payer).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(sys.db.fetch_ledger_entries_for_bid(&"bid_1".into()).await.unwrap().is_empty());
    let audit = sys.db.fetch_audit_log("order", abandoned.order_id.as_str()).await.unwrap();
    assert_eq!(audit.iter().map(|e| e.action.as_str()).collect::<Vec<_>>(), vec!["created", "expired"]);

    // A fresh order can be opened for the expired bid
    let reopened = sys.orders.create_order(&"bid_1".into(), &payer, "k3").await.unwrap();
    assert!(!reopened.reused);
    assert_ne!(reopened.order_id, abandoned.order_id);
    sys.tear_down().await;
}
