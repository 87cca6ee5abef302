// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration surface.
//!
//! Loaded from `{baseDir}/config/config.json` (camelCase keys); every
//! field has a default so a missing file yields a runnable config.
//! `baseDir` and `historyDir` are resolved against the workspace root.

use serde::{Deserialize, Serialize};
use sg_core::Role;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ashigaruCount must be at least 1")]
    NoAshigaru,
    #[error("unknown provider: {0:?}")]
    UnknownProvider(String),
}

/// Model selection per role, with a shared default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Models {
    pub default: Option<String>,
    pub shogun: Option<String>,
    pub karou: Option<String>,
    pub ashigaru: Option<String>,
}

/// Opaque provider tuning forwarded to the adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSpecific {
    pub config: Option<serde_json::Value>,
    pub env: HashMap<String, String>,
    pub reasoning_effort: Option<String>,
    pub additional_directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 7777 }
    }
}

pub const DEFAULT_ASHIGARU_COUNT: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub base_dir: PathBuf,
    /// Defaults to `{baseDir}/history` when absent.
    pub history_dir: Option<PathBuf>,
    pub ashigaru_count: u32,
    pub provider: String,
    pub models: Models,
    pub provider_specific: ProviderSpecific,
    /// Free-text profile per ashigaru id, woven into its system prompt.
    pub ashigaru_profiles: HashMap<String, String>,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".shogun"),
            history_dir: None,
            ashigaru_count: DEFAULT_ASHIGARU_COUNT,
            provider: "claude".to_string(),
            models: Models::default(),
            provider_specific: ProviderSpecific::default(),
            ashigaru_profiles: HashMap::new(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.ashigaru_count < 1 {
            return Err(ConfigError::NoAshigaru);
        }
        Ok(self)
    }

    /// Resolve relative directories against the workspace root.
    pub fn resolved(mut self, workspace_root: &Path) -> Self {
        if self.base_dir.is_relative() {
            self.base_dir = workspace_root.join(&self.base_dir);
        }
        self.history_dir = Some(match self.history_dir.take() {
            Some(dir) if dir.is_relative() => workspace_root.join(dir),
            Some(dir) => dir,
            None => self.base_dir.join("history"),
        });
        self
    }

    /// The resolved history directory (falls back to `{baseDir}/history`).
    pub fn history_dir(&self) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("history"))
    }

    /// Model for a role: per-role override, then the shared default.
    pub fn model_for(&self, role: Role) -> Option<&str> {
        let specific = match role {
            Role::Shogun => self.models.shogun.as_deref(),
            Role::Karou => self.models.karou.as_deref(),
            Role::Ashigaru => self.models.ashigaru.as_deref(),
            Role::King => None,
        };
        specific.or(self.models.default.as_deref())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
