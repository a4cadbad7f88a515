use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use fee_payment_engine::{config::EngineConfig, review_router::HighRiskAction};
use fpe_common::{parse_boolean_flag, parse_env_or_default, Secret};
use log::*;

const DEFAULT_FPS_HOST: &str = "127.0.0.1";
const DEFAULT_FPS_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/platform_fees.db";
const DEFAULT_BILLING_INTERVAL: StdDuration = StdDuration::from_secs(24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The key the upstream gateway signs forwarded identities with.
    pub gateway_secret: Secret<String>,
    /// Run the embedded migrations at start-up.
    pub run_migrations: bool,
    /// How often the billing worker walks the unpaid contracts. The worker also expires abandoned orders.
    pub billing_interval: StdDuration,
    /// When false, billing only runs on demand through the admin endpoint.
    pub billing_worker_enabled: bool,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FPS_HOST.to_string(),
            port: DEFAULT_FPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway_secret: Secret::default(),
            run_migrations: true,
            billing_interval: DEFAULT_BILLING_INTERVAL,
            billing_worker_enabled: true,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        Self::from_source(|name| env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value. Bad values are logged and
    /// replaced with the default.
    pub fn from_source<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let complain = |name: &'static str| {
            move |value: &str, e: String| error!("🪛️ {value} is not a valid value for {name}. {e} Using the default.")
        };
        let host = lookup("FPS_HOST").unwrap_or(defaults.host);
        let port = parse_env_or_default(lookup("FPS_PORT"), defaults.port, complain("FPS_PORT"));
        let database_url = lookup("FPS_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ FPS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            defaults.database_url
        });
        let gateway_secret = lookup("FPS_GATEWAY_SECRET").map(Secret::new).unwrap_or_else(|| {
            error!(
                "🪛️ FPS_GATEWAY_SECRET is not set. No request signed by the gateway will be accepted until it is \
                 configured."
            );
            Secret::default()
        });
        let run_migrations = parse_boolean_flag(lookup("FPS_RUN_MIGRATIONS"), defaults.run_migrations);
        let billing_worker_enabled = parse_boolean_flag(lookup("FPS_BILLING_WORKER"), defaults.billing_worker_enabled);
        let interval_secs = parse_env_or_default(
            lookup("FPS_BILLING_INTERVAL_SECS"),
            defaults.billing_interval.as_secs(),
            complain("FPS_BILLING_INTERVAL_SECS"),
        );
        let billing_interval = StdDuration::from_secs(interval_secs.max(1));

        let mut engine = defaults.engine;
        engine.fees.rate_bps =
            parse_env_or_default(lookup("FPS_FEE_RATE_BPS"), engine.fees.rate_bps, complain("FPS_FEE_RATE_BPS"));
        if let Some(name) = lookup("FPS_PLATFORM_RECEIVER_NAME").filter(|s| !s.trim().is_empty()) {
            engine.fraud.platform_receiver_name = name;
        }
        engine.routing.auto_approve_max_score = parse_env_or_default(
            lookup("FPS_AUTO_APPROVE_MAX_SCORE"),
            engine.routing.auto_approve_max_score,
            complain("FPS_AUTO_APPROVE_MAX_SCORE"),
        );
        engine.routing.auto_reject_above = parse_env_or_default(
            lookup("FPS_AUTO_REJECT_MIN_SCORE"),
            engine.routing.auto_reject_above,
            complain("FPS_AUTO_REJECT_MIN_SCORE"),
        );
        if let Some(action) = lookup("FPS_HIGH_RISK_ACTION") {
            match parse_high_risk_action(&action) {
                Some(a) => engine.routing.high_risk_action = a,
                None => error!("🪛️ {action} is not a valid FPS_HIGH_RISK_ACTION. Use auto_reject or manual_review."),
            }
        }
        let expiry_hours = parse_env_or_default(
            lookup("FPS_ORDER_EXPIRY_HOURS"),
            engine.order_expiry.num_hours(),
            complain("FPS_ORDER_EXPIRY_HOURS"),
        );
        engine.order_expiry = Duration::hours(expiry_hours);
        if let Err(e) = engine.validate() {
            error!("🪛️ {e}. Reverting to the default engine configuration.");
            engine = EngineConfig::default();
        }
        Self {
            host,
            port,
            database_url,
            gateway_secret,
            run_migrations,
            billing_interval,
            billing_worker_enabled,
            engine,
        }
    }
}

fn parse_high_risk_action(value: &str) -> Option<HighRiskAction> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto_reject" | "reject" => Some(HighRiskAction::AutoReject),
        "manual_review" | "review" => Some(HighRiskAction::ManualReview),
        _ => None,
    }
}
