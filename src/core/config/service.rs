use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use super::paths::AppPaths;
use crate::cache::CacheConfig;
use crate::chat::ChatConfig;
use crate::generator::GeneratorConfig;
use crate::retrieval::RetrievalConfig;

/// Typed application configuration, loaded from `config.yml`.
///
/// Every section falls back to its defaults, so a missing or partial file
/// still yields a runnable configuration. A malformed file is logged and
/// replaced with the defaults rather than aborting startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub chat: ChatConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

impl AppConfig {
    pub fn load(paths: &AppPaths) -> Self {
        let path = config_path(paths);
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str::<AppConfig>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        "Invalid config at {}: {}; using defaults",
                        path.display(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    "Failed to read config at {}: {}; using defaults",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("AUTHORAI_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    let user_config = paths.user_data_dir.join("config.yml");
    if user_config.exists() {
        return user_config;
    }

    paths.project_root.join("config.yml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.cache.max_entries.is_none());
        assert!(config.cache.ttl_secs.is_none());
        assert_eq!(config.chat.cache_hit_delay_ms, 400);
        assert_eq!(config.chat.retention_days, 10);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "cache:\n  max_entries: 64\nchat:\n  cache_hit_delay_ms: 0\n",
        )
        .unwrap();

        assert_eq!(config.cache.max_entries, Some(64));
        assert_eq!(config.chat.cache_hit_delay_ms, 0);
        // Untouched sections keep their defaults.
        assert_eq!(config.chat.retention_days, 10);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.server.port, 8787);
    }
}
