//! # wfpd-server
//!
//! REST front end for the WFP scan dispatcher.
//!
//! ## Overview
//!
//! The server accepts fingerprint (WFP) uploads, resolves an effective scan
//! configuration per request, fans batches out across a worker pool that
//! drives the external scan engine, and reassembles the partial results into
//! one JSON response. Large uploads can be delivered in chunks through batch
//! sessions. A handful of auxiliary endpoints expose engine lookups, health
//! and request metrics.

pub mod errors;
pub mod handlers;
pub mod infra;
pub mod middleware;
pub mod routes;

pub use errors::{AppError, AppResult};
pub use infra::app_state::{AppState, RequestCounters};
pub use routes::create_router;
