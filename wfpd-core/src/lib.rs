//! # wfpd-core
//!
//! Domain library for the WFP scan dispatch server.
//!
//! ## Overview
//!
//! This crate owns the request-independent machinery of the dispatcher:
//!
//! - **WFP splitting/grouping**: parsing a raw fingerprint blob into records
//!   and grouping them into engine-sized batches
//! - **Scan configuration resolution**: merging server defaults, legacy
//!   request parameters and an optional settings payload under per-field
//!   authorization policy
//! - **Dispatch**: fan-out of batches across a bounded worker pool and
//!   fan-in of partial results into one JSON response
//! - **Batch sessions**: multi-chunk upload accumulation with per-session
//!   locking and guaranteed cleanup on finalization
//! - **Engine clients**: the subprocess-backed scan engine invoker plus a
//!   scripted client for tests

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod session;
pub mod settings;
pub mod wfp;

pub use dispatch::Dispatcher;
pub use engine::{EngineClient, ProcessEngine, ScriptedEngine};
pub use error::ScanError;
pub use session::SessionRegistry;
pub use settings::{LegacyParams, SbomType, ScanConfig, ScanSettings, resolve};
pub use wfp::{WfpBatch, WfpRecord};
