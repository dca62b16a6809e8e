pub mod engine_handlers;
pub mod scan_handlers;
pub mod status_handlers;
