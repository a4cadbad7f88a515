//! Platform Fee Payment Engine
//!
//! The engine collects the platform fee owed on every accepted bid in a freight marketplace. Payers upload a
//! screenshot of their e-wallet transfer; the engine scores the extracted receipt for fraud, approves the clear cases
//! automatically, queues the rest for an admin, and activates the contract once the fee is verified. Unpaid contracts
//! run on a billing clock that ends in account suspension.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supplied backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@fpe_api`]). This provides the public-facing functionality of the engine: contract
//!    registration, orders, evidence verification, review decisions and billing. Storage backends need to implement
//!    [`FeeLedgerDatabase`] in order to act as a backend for the engine.
//!
//! The pure building blocks (fee calculation, fraud rules, routing, the billing clock, contract activation) live in
//! their own modules and can be used without a database.
//!
//! The engine also emits events. Payer and counterparty notifications, and contract activations, are published to any
//! hooks registered through [`events::EventHooks`].
mod db;

pub mod billing_schedule;
pub mod config;
pub mod contract_activator;
pub mod db_types;
pub mod events;
pub mod extractor;
pub mod fee_calculator;
pub mod fraud;
pub mod helpers;
pub mod review_router;

mod fpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{
    BillingOutcome,
    FeeLedgerDatabase,
    HistoryQuery,
    InsertResult,
    Resolution,
    ResolutionOutcome,
    Resolver,
    AUTO_REVIEW_ACTOR,
};
pub use fpe_api::{
    billing_api::BillingApi,
    contract_api::ContractApi,
    decision_api::DecisionApi,
    errors::{ErrorCode, FeeEngineError},
    objects,
    order_api::OrderApi,
    verification_api::VerificationApi,
};
