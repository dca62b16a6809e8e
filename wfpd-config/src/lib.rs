//! Configuration library for the WFP scan dispatch server.
//!
//! Centralizes the typed configuration model and its environment loader so
//! the server binary and tests share one source of truth for defaults and
//! env names. Loading is lenient: a malformed value falls back to its
//! default and surfaces as a warning rather than refusing to start.

pub mod loader;
pub mod models;

pub use loader::{ConfigLoad, load, load_list_file};
pub use models::{AppConfig, Config, FilteringConfig, ScanningConfig, TlsConfig};
