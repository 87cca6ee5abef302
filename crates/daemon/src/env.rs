// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Workspace root the base directory resolves against:
/// `SHOGUN_WORKSPACE` > current directory.
pub fn workspace_root() -> PathBuf {
    if let Ok(dir) = std::env::var("SHOGUN_WORKSPACE") {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Config file location: `SHOGUN_CONFIG` > `{base}/config/config.json`.
pub fn config_path(base_dir: &std::path::Path) -> PathBuf {
    if let Ok(path) = std::env::var("SHOGUN_CONFIG") {
        return PathBuf::from(path);
    }
    base_dir.join("config/config.json")
}

/// Polling watch mode toggle (`SHOGUN_POLL_WATCH=1`); native filesystem
/// events otherwise.
pub fn poll_watch() -> bool {
    std::env::var("SHOGUN_POLL_WATCH")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Grace period between a restart request being acknowledged and process
/// exit, so the request file gets archived (`SHOGUN_RESTART_GRACE_MS`).
pub fn restart_grace() -> Duration {
    std::env::var("SHOGUN_RESTART_GRACE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(500))
}

/// Log filter for the subscriber (`SHOGUN_LOG` > `RUST_LOG` > "info").
pub fn log_filter() -> String {
    std::env::var("SHOGUN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}
