//! Settings schema and layered settings loading.
//!
//! This crate owns the Banter settings model, provider selection, and the
//! layer-merging logic shared by the client and SDK.

mod error;
mod loader;
mod model;

/// Public error type returned by settings loading and validation APIs.
pub use error::ConfigError;
/// Layered settings types and loader options.
pub use loader::{LayeredSettings, SettingsLayer, SettingsLayerSource, SettingsOptions};
/// Settings schema models.
pub use model::*;
