pub mod host;

use crate::core::{OrmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub use host::{ConnectionSettings, Credential, HostAndPort, HostConfig};

/// Strategy name used when an entity does not pick one.
pub const DEFAULT_STRATEGY: &str = "default";

/// Named cache sizing policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStrategy {
    pub strategy: String,
    /// Maximum cached entities, 0 for unbounded
    pub size: usize,
    /// Entry lifetime in milliseconds, 0 for no expiry
    #[serde(default)]
    pub expire_millis: u64,
}

impl CacheStrategy {
    pub fn new(strategy: &str, size: usize, expire_millis: u64) -> Self {
        Self {
            strategy: strategy.to_string(),
            size,
            expire_millis,
        }
    }
}

/// How a cache handle writes modified entities back
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersisterKind {
    /// Every update is written to the store immediately
    WriteThrough,
    /// Updates are kept dirty until flushed
    Deferred,
}

/// Named persistence backend policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersisterStrategy {
    pub strategy: String,
    pub kind: PersisterKind,
}

impl PersisterStrategy {
    pub fn new(strategy: &str, kind: PersisterKind) -> Self {
        Self {
            strategy: strategy.to_string(),
            kind,
        }
    }
}

/// Registry configuration
///
/// # Examples
///
/// ```
/// use docorm::config::{CacheStrategy, OrmConfig, PersisterKind, PersisterStrategy};
///
/// let config = OrmConfig::new("app::entity")
///     .cache(CacheStrategy::new("LRU-1000", 1000, 0))
///     .persister(PersisterStrategy::new("default", PersisterKind::Deferred));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrmConfig {
    /// Module path whose registered entities are scanned
    pub entity_package: String,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub caches: Vec<CacheStrategy>,

    #[serde(default)]
    pub persisters: Vec<PersisterStrategy>,
}

impl OrmConfig {
    pub fn new(entity_package: &str) -> Self {
        Self {
            entity_package: entity_package.to_string(),
            host: HostConfig::default(),
            caches: Vec::new(),
            persisters: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set the store host
    pub fn host(mut self, host: HostConfig) -> Self {
        self.host = host;
        self
    }

    /// Add a cache strategy
    pub fn cache(mut self, strategy: CacheStrategy) -> Self {
        self.caches.push(strategy);
        self
    }

    /// Add a persister strategy
    pub fn persister(mut self, strategy: PersisterStrategy) -> Self {
        self.persisters.push(strategy);
        self
    }

    pub fn cache_strategy(&self, name: &str) -> Option<&CacheStrategy> {
        self.caches.iter().find(|it| it.strategy == name)
    }

    pub fn persister_strategy(&self, name: &str) -> Option<&PersisterStrategy> {
        self.persisters.iter().find(|it| it.strategy == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.entity_package.trim().is_empty() {
            return Err(OrmError::Config("entity_package cannot be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for cache in &self.caches {
            if !seen.insert(cache.strategy.as_str()) {
                return Err(OrmError::Config(format!(
                    "Duplicate cache strategy '{}'",
                    cache.strategy
                )));
            }
        }

        let mut seen = HashSet::new();
        for persister in &self.persisters {
            if !seen.insert(persister.strategy.as_str()) {
                return Err(OrmError::Config(format!(
                    "Duplicate persister strategy '{}'",
                    persister.strategy
                )));
            }
        }

        ConnectionSettings::from_host(&self.host)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    const CONFIG_JSON: &str = r#"{
        "entity_package": "game::entity",
        "host": {
            "database": "game",
            "address": { "primary": "127.0.0.1:27017" },
            "user": "",
            "password": ""
        },
        "caches": [
            { "strategy": "default", "size": 10000, "expire_millis": 600000 },
            { "strategy": "LRU-1000", "size": 1000 }
        ],
        "persisters": [
            { "strategy": "default", "kind": "deferred" },
            { "strategy": "instant", "kind": "write_through" }
        ]
    }"#;

    #[test]
    fn test_parse_json() {
        let config = OrmConfig::from_json_str(CONFIG_JSON).unwrap();
        assert_eq!(config.entity_package, "game::entity");
        assert_eq!(config.host.database, "game");
        assert_eq!(config.cache_strategy("LRU-1000").unwrap().expire_millis, 0);
        assert_eq!(
            config.persister_strategy("instant").unwrap().kind,
            PersisterKind::WriteThrough
        );
        assert!(config.cache_strategy("missing").is_none());
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let config = OrmConfig::new("game::entity")
            .cache(CacheStrategy::new("default", 10, 0))
            .cache(CacheStrategy::new("default", 20, 0));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_blank_package_rejected() {
        assert!(OrmConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orm.json");
        std::fs::write(&path, CONFIG_JSON).unwrap();
        let config = OrmConfig::from_path(&path).unwrap();
        assert_eq!(config.caches.len(), 2);

        let missing = OrmConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Configuration);
    }
}
