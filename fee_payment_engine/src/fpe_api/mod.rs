//! # Platform fee engine public API
//!
//! The `fpe_api` module exposes the programmatic API for the platform fee engine. The API is split along the
//! lifecycle of a fee, so that clients can pick the parts they need:
//!
//! * [`contract_api`] registers accepted bids as contracts and works out who owes what.
//! * [`order_api`] opens, reuses, lists and expires platform fee orders.
//! * [`verification_api`] takes payment evidence, scores it for fraud and routes it for review.
//! * [`decision_api`] applies review decisions, which activates contracts and posts the fee ledger.
//! * [`billing_api`] runs the billing clock over unpaid contracts.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements [`crate::FeeLedgerDatabase`], plus whatever
//! policy or event producers it needs.
//!
//! ```rust,ignore
//! use fee_payment_engine::{OrderApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/platform_fees.db", 25).await?;
//! let api = OrderApi::new(db);
//! let order = api.create_order(&bid_id, &caller_id, "checkout-7f3a").await?;
//! ```
pub mod billing_api;
pub mod contract_api;
pub mod decision_api;
pub mod errors;
pub mod objects;
pub mod order_api;
pub mod verification_api;
