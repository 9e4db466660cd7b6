//! Service configuration using Figment for layered config merging.
//!
//! Merge order (later overrides earlier): compiled defaults, then
//! `pet-adoption.toml` (or an explicit path), then `PET_ADOPTION_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "pet-adoption.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub lifecycle: LifecycleConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Discard the database when the process exits.
    pub temporary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How many times a commit that lost a race on the pet is re-read and
    /// retried before the caller gets a conflict.
    pub max_commit_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            lifecycle: LifecycleConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pet-adoption.db"),
            temporary: false,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 2,
        }
    }
}

/// Load from `./pet-adoption.toml` (if present) with env var overrides.
pub fn load_config() -> Result<AppConfig, figment::Error> {
    load_config_from_path(Path::new(CONFIG_FILE))
}

pub fn load_config_from_path(path: &Path) -> Result<AppConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// TOML only, no environment. Used by tests.
pub fn load_config_from_str(toml_content: &str) -> Result<AppConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

// Section names are mapped explicitly: splitting on "_" would break keys
// such as max_commit_retries.
fn env_provider() -> Env {
    Env::prefixed("PET_ADOPTION_").map(|key| {
        key.as_str()
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("lifecycle_", "lifecycle.", 1)
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.lifecycle.max_commit_retries, 2);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn sections_override_defaults() {
        let config = load_config_from_str(
            r#"
            log_level = "debug"

            [server]
            port = 8080

            [storage]
            path = "/var/lib/pet-adoption"
            temporary = true

            [lifecycle]
            max_commit_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/pet-adoption"));
        assert!(config.storage.temporary);
        assert_eq!(config.lifecycle.max_commit_retries, 1);
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(load_config_from_str("[server]\nport = \"eighty\"").is_err());
    }
}
