//! LAN share server library.
//!
//! Two independent features behind one router: a file drop zone (list, browse,
//! upload, download under a shared root directory) and a shared clipboard
//! synchronized to every connected client over Server-Sent Events.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

pub use config::Config;
pub use error::ShareError;
pub use sync::SyncHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Root directory files are served from and uploaded into
    pub root_dir: PathBuf,
    /// Configuration
    pub config: Arc<Config>,
    /// Shared clipboard hub
    pub sync: Arc<SyncHub>,
}

impl AppState {
    /// Create a new AppState with the given root directory and default config.
    pub fn new(root_dir: PathBuf) -> Self {
        Self::with_config(root_dir, Config::default())
    }

    /// Create a new AppState with the given root directory and config.
    pub fn with_config(root_dir: PathBuf, config: Config) -> Self {
        Self {
            root_dir,
            config: Arc::new(config),
            sync: Arc::new(SyncHub::new()),
        }
    }
}
