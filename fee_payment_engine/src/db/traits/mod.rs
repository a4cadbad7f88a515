//! # Storage backend contract
//!
//! The [`FeeLedgerDatabase`] trait is everything the engine needs from a storage backend. The engine APIs are generic
//! over it; [`crate::SqliteDatabase`] is the supplied implementation.
//!
//! Methods that change more than one record are atomic. Where a method's documentation mentions a check, the check is
//! made inside the same transaction as the write it guards.
mod data_objects;
mod fee_ledger_database;

pub use data_objects::{
    AutomaticReview,
    BillingOutcome,
    HistoryQuery,
    InsertResult,
    Resolution,
    ResolutionOutcome,
    Resolver,
    AUTO_REVIEW_ACTOR,
};
pub use fee_ledger_database::FeeLedgerDatabase;
