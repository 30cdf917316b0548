//! Public SDK surface for Banter.
//!
//! This crate re-exports the building blocks, provides wiring helpers for
//! the two stock persistence backends, and a small initialization helper to
//! keep consumer setup consistent.

/// Re-export for convenience.
pub use banter_rs_config as config;
pub use banter_rs_core as core;
/// Re-export for convenience.
pub use banter_rs_gateway as gateway;
/// Re-export for convenience.
pub use banter_rs_protocol as protocol;

use banter_rs_config::Settings;
use banter_rs_core::{ChatClient, FsDurableStore, HttpDurableStore, StoreError, SyncEngine};
use banter_rs_gateway::Gateway;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Wire a client that persists chats to a directory of JSON files.
pub fn client_with_fs_store(
    settings: Settings,
    dir: impl Into<PathBuf>,
) -> Result<ChatClient, StoreError> {
    let store = Arc::new(FsDurableStore::new(dir)?);
    Ok(wire(settings, store))
}

/// Wire a client that persists chats through a remote store.
pub fn client_with_remote_store(settings: Settings, base_url: impl Into<String>) -> ChatClient {
    let store = Arc::new(HttpDurableStore::new(base_url));
    wire(settings, store)
}

fn wire(settings: Settings, store: Arc<dyn banter_rs_core::DurableStore>) -> ChatClient {
    let settings = Arc::new(RwLock::new(settings));
    let gateway = Arc::new(Gateway::new(settings.clone()));
    let sync = Arc::new(SyncEngine::new(store));
    ChatClient::new(settings, gateway, sync)
}

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
