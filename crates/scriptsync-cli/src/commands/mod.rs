//! CLI command implementations for `scriptsync`.
//!
//! - [`segment`] -- Script segmentation preview.
//! - [`track`] -- Transcript tracking session with optional paced feed.
//! - [`config_cmd`] -- Resolved configuration.

pub mod config_cmd;
pub mod segment;
pub mod track;

use std::path::Path;

use scriptsync_core::SyncConfig;

/// Load configuration from the given path override or via discovery
/// (`SCRIPTSYNC_CONFIG`, then `~/.scriptsync/config.json`).
pub fn load_config(config_override: Option<&str>) -> anyhow::Result<SyncConfig> {
    if let Some(path_str) = config_override {
        let path = Path::new(path_str);
        if !path.exists() {
            anyhow::bail!("config file not found: {path_str}");
        }
        return SyncConfig::load(Some(path))
            .map_err(|e| anyhow::anyhow!("failed to load config {path_str}: {e}"));
    }
    SyncConfig::load(None).map_err(|e| anyhow::anyhow!("failed to load config: {e}"))
}
