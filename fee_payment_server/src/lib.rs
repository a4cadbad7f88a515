//! # Platform fee payment server
//! This crate hosts the HTTP daemon for the platform fee payment engine. It is responsible for:
//! * Opening platform fee orders for accepted bids, and taking payment evidence from payers.
//! * Receiving extraction results for that evidence and passing them to the engine for scoring and routing.
//! * Giving admins the review queue and a way to approve or reject what is in it.
//! * Registering contracts, and running the billing clock on the ones whose fee is still unpaid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Everything else. These routes need an identity signed by the API gateway. See
//!   [gateway_auth](middleware/gateway_auth/index.html).

pub mod billing_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
