//! HTTP request handlers.
//!
//! - [`validate`] - Validate a single resource
//! - [`bundle`] - Validate a batch bundle entry by entry
//! - [`info`] - Application info and the HTML index page
//! - [`health`] - Health check endpoints

pub mod bundle;
pub mod health;
pub mod info;
pub mod validate;

// Re-export handlers for convenience
pub use bundle::validate_bundle_handler;
pub use health::{health_handler, liveness_handler};
pub use info::{index_handler, info_handler};
pub use validate::validate_handler;
