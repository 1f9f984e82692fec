//! Core types, static tables, and the pure risk-scoring engine for
//! Carewatch.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod benchmark;
pub mod category;
pub mod engine;
pub mod error;
pub mod fact;
pub mod focus;
pub mod history;
pub mod metrics;
pub mod overall;
pub mod profile;
pub mod quality;
pub mod scoring;
pub mod severity;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
