#![allow(dead_code)]
use std::{
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, Utc};
use fee_payment_engine::{
    config::EngineConfig,
    db_types::{BidId, Centavos, ExtractedData, ImageMetadata, ListingType, Principal, Role, UserId},
    events::{ContractActivatedEvent, EventHandlers, EventHooks, Notification, NotificationType},
    extractor::ExtractionOutcome,
    fee_calculator::BidTerms,
    objects::ContractRegistration,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BillingApi,
    ContractApi,
    DecisionApi,
    FeeLedgerDatabase,
    OrderApi,
    SqliteDatabase,
    VerificationApi,
};
use futures_util::FutureExt;
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const PLATFORM_RECEIVER: &str = "TRUCKLINK PLATFORM SERVICES";

/// Collects everything published to a hook so tests can look at it.
#[derive(Debug)]
pub struct Inbox<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Inbox<T> {
    fn clone(&self) -> Self {
        Self { items: Arc::clone(&self.items) }
    }
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self { items: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl<T: Clone> Inbox<T> {
    pub fn push(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    pub fn all(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    /// Waits (briefly) until at least `n` items have arrived, and returns them all.
    pub async fn wait_for(&self, n: usize) -> Vec<T> {
        for _ in 0..100 {
            if self.items.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        self.all()
    }
}

impl Inbox<Notification> {
    pub fn of_kind(&self, kind: NotificationType) -> Vec<Notification> {
        self.all().into_iter().filter(|n| n.kind == kind).collect()
    }
}

#[derive(Debug)]
pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub config: EngineConfig,
    pub contracts: ContractApi<SqliteDatabase>,
    pub orders: OrderApi<SqliteDatabase>,
    pub verification: VerificationApi<SqliteDatabase>,
    pub decisions: DecisionApi<SqliteDatabase>,
    pub billing: BillingApi<SqliteDatabase>,
    pub notifications: Inbox<Notification>,
    pub activations: Inbox<ContractActivatedEvent>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::new_with_config(EngineConfig::default()).await
    }

    pub async fn new_with_config(config: EngineConfig) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let notifications = Inbox::default();
        let activations = Inbox::default();
        let mut hooks = EventHooks::default();
        let sink = notifications.clone();
        hooks.on_notification(move |n| {
            let sink = sink.clone();
            async move {
                debug!("🪝️ {:?} for {}", n.kind, n.recipient_id);
                sink.push(n);
            }
            .boxed()
        });
        let sink = activations.clone();
        hooks.on_contract_activated(move |ev| {
            let sink = sink.clone();
            async move { sink.push(ev) }.boxed()
        });
        let handlers = EventHandlers::new(64, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        Self {
            contracts: ContractApi::new(db.clone(), config.fees, config.billing),
            orders: OrderApi::new(db.clone()),
            verification: VerificationApi::new(db.clone(), &config, producers.clone()),
            decisions: DecisionApi::new(db.clone(), producers.clone()),
            billing: BillingApi::new(db.clone(), config.billing, producers),
            url,
            db,
            config,
            notifications,
            activations,
        }
    }

    /// Registers a cargo contract: `bidder` pays 5% of `price_pesos`. The bidder's account is backdated so that new
    /// account checks do not interfere.
    pub async fn cargo_contract(
        &self,
        bid: &str,
        owner: &str,
        bidder: &str,
        price_pesos: i64,
        billing_started_at: DateTime<Utc>,
    ) -> ContractRegistration {
        let terms = BidTerms {
            bid_id: BidId::from(bid),
            listing_type: ListingType::Cargo,
            listing_owner_id: UserId::from(owner),
            bidder_id: UserId::from(bidder),
            agreed_price: Centavos::from_pesos(price_pesos),
        };
        self.db.register_user(&UserId::from(bidder), Utc::now() - Duration::days(365)).await.unwrap();
        self.contracts.register_contract(terms, billing_started_at).await.expect("Error registering contract")
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Failed to remove test database {}: {e}", self.url);
        }
    }
}

pub fn admin() -> Principal {
    Principal::new("admin_ana", &[Role::Admin])
}

/// A clean e-wallet receipt for `amount`, paid to the platform just now.
pub fn receipt(amount: Centavos, reference: &str) -> ExtractionOutcome {
    ExtractionOutcome::Completed {
        data: ExtractedData {
            reference_number: Some(reference.to_string()),
            amount: Some(amount),
            receiver_name: Some(PLATFORM_RECEIVER.to_string()),
            timestamp_text: Some(Utc::now().to_rfc3339()),
            confidence: 96,
        },
        image: clean_image(),
    }
}

pub fn clean_image() -> ImageMetadata {
    ImageMetadata {
        image_hash: format!("{:016x}", rand::random::<u64>()),
        width: 1080,
        height: 2340,
        has_exif_metadata: true,
    }
}
