//! Tesoro orchestration layer.
//!
//! Wires the workspace crates into per-actor sessions: the authorization
//! state machine (tesoro-authz), the notification aggregator behind its
//! refresh gate (tesoro-notify) and the sqlite-backed stores plus change
//! feed (tesoro-store). The [`SessionController`] is the entry point a UI
//! or service layer talks to.

pub mod config;
pub mod error;
pub mod session;

pub use config::{NotificationConfig, RootConfig};
pub use error::{RootError, RootResult};
pub use session::SessionController;

use std::sync::Arc;

use tesoro_store::{ChangeFeedHub, SqliteStore};

/// Initialize tracing with `RUST_LOG`-style filtering, defaulting to info.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open the sqlite store under the configured data directory, attached to
/// a fresh change-feed hub.
pub fn open_store(config: &RootConfig) -> RootResult<(Arc<SqliteStore>, Arc<ChangeFeedHub>)> {
    config.validate()?;
    std::fs::create_dir_all(&config.data_dir).map_err(RootError::Io)?;
    let path = config.database_path();
    let path = path
        .to_str()
        .ok_or_else(|| RootError::Config("data_dir is not valid UTF-8".into()))?;
    let feed = Arc::new(ChangeFeedHub::new());
    let store = Arc::new(SqliteStore::open(path)?.with_feed(feed.clone()));
    Ok((store, feed))
}
