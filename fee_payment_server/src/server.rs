use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use fee_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    BillingApi,
    ContractApi,
    DecisionApi,
    OrderApi,
    SqliteDatabase,
    VerificationApi,
};
use futures::FutureExt;
use log::*;

use crate::{
    billing_worker::start_billing_worker,
    config::ServerConfig,
    errors::ServerError,
    middleware::GatewayAuthFactory,
    routes::{
        health,
        CreateOrderRoute,
        ExtractionResultRoute,
        MyPendingOrdersRoute,
        OrderByIdRoute,
        RegisterContractRoute,
        ResolveSubmissionRoute,
        ReviewQueueRoute,
        RunBillingRoute,
        SubmitEvidenceRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    }
    let handlers = EventHandlers::new(128, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.billing_worker_enabled {
        let billing = BillingApi::new(db.clone(), config.engine.billing, producers.clone());
        let orders = OrderApi::new(db.clone());
        // Dropping the handle detaches the worker
        let _worker = start_billing_worker(billing, orders, config.billing_interval, config.engine.order_expiry);
    } else {
        info!("🕰️ Billing worker is disabled. Billing runs only through the admin endpoint.");
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Delivery to payers (SMS, push, email) is someone else's job. The server records what it would have sent.
fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_notification(|n| {
            async move {
                info!("📬️ [{:?}] to {}: {}", n.kind, n.recipient_id, n.title);
                debug!("📬️ {}", n.message);
            }
            .boxed()
        })
        .on_contract_activated(|ev| {
            async move {
                info!(
                    "📬️ Contract {} is active. Order {} settled by ledger entry {}",
                    ev.contract.contract_id, ev.order.order_id, ev.ledger_entry.id
                );
            }
            .boxed()
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fps::access_log"))
            .configure(configure_app(&config, db.clone(), producers.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers the engine APIs and every route. Each worker gets its own copy of the APIs; they share the database pool
/// and the event producers.
pub fn configure_app(
    config: &ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> impl FnOnce(&mut ServiceConfig) {
    let engine = config.engine.clone();
    let secret = config.gateway_secret.clone();
    move |cfg| {
        let orders_api = OrderApi::new(db.clone());
        let contracts_api = ContractApi::new(db.clone(), engine.fees, engine.billing);
        let verification_api = VerificationApi::new(db.clone(), &engine, producers.clone());
        let decision_api = DecisionApi::new(db.clone(), producers.clone());
        let billing_api = BillingApi::new(db, engine.billing, producers);
        // Routes that require an identity forwarded by the gateway
        let api_scope = web::scope("/api")
            .wrap(GatewayAuthFactory::new(secret))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyPendingOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(SubmitEvidenceRoute::<SqliteDatabase>::new())
            .service(ExtractionResultRoute::<SqliteDatabase>::new())
            .service(ReviewQueueRoute::<SqliteDatabase>::new())
            .service(ResolveSubmissionRoute::<SqliteDatabase>::new())
            .service(RegisterContractRoute::<SqliteDatabase>::new())
            .service(RunBillingRoute::<SqliteDatabase>::new());
        cfg.app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(contracts_api))
            .app_data(web::Data::new(verification_api))
            .app_data(web::Data::new(decision_api))
            .app_data(web::Data::new(billing_api))
            .service(health)
            .service(api_scope);
    }
}
