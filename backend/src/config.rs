//! Store Configuration
//!
//! Which backend to open and how counters are incremented. Persisted as JSON
//! in the client's data directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{DomainError, DomainResult};
use crate::repository::{CounterStrategy, ProjectRepository, RemoteStore, RestStore, SqliteStore};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_DB_FILE_NAME: &str = "retro_board.db";

fn default_poll_interval_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Sqlite {
        path: PathBuf,
    },
    Remote {
        url: String,
        api_key: String,
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub counter_strategy: CounterStrategy,
}

impl AppConfig {
    /// SQLite file inside `data_dir`, atomic counters
    pub fn default_for(data_dir: &Path) -> Self {
        Self {
            backend: BackendConfig::Sqlite {
                path: data_dir.join(DEFAULT_DB_FILE_NAME),
            },
            counter_strategy: CounterStrategy::default(),
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE_NAME)
    }

    /// Load `<data_dir>/config.json`, falling back to defaults when absent
    pub fn load(data_dir: &Path) -> DomainResult<Self> {
        let path = Self::path_in(data_dir);
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default_for(data_dir));
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| DomainError::Store(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| DomainError::Validation(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, data_dir: &Path) -> DomainResult<PathBuf> {
        self.validate()?;
        std::fs::create_dir_all(data_dir)
            .map_err(|e| DomainError::Store(format!("Failed to create {}: {}", data_dir.display(), e)))?;

        let path = Self::path_in(data_dir);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .map_err(|e| DomainError::Store(format!("Failed to write {}: {}", path.display(), e)))?;
        log::info!("saved config to {}", path.display());
        Ok(path)
    }

    pub fn validate(&self) -> DomainResult<()> {
        match &self.backend {
            BackendConfig::Sqlite { path } if path.as_os_str().is_empty() => {
                Err(DomainError::Validation("sqlite path is empty".into()))
            }
            BackendConfig::Remote { url, .. } if !(url.starts_with("http://") || url.starts_with("https://")) => {
                Err(DomainError::Validation(format!("remote url must be http(s): '{}'", url)))
            }
            BackendConfig::Remote { api_key, .. } if api_key.trim().is_empty() => {
                Err(DomainError::Validation("remote api key is empty".into()))
            }
            BackendConfig::Remote { poll_interval_ms, .. } if *poll_interval_ms == 0 => {
                Err(DomainError::Validation("poll interval must be positive".into()))
            }
            _ => Ok(()),
        }
    }

    /// Open the configured backend
    pub fn open_store(&self) -> DomainResult<Arc<dyn RemoteStore>> {
        let store: Arc<dyn RemoteStore> = match &self.backend {
            BackendConfig::Sqlite { path } => Arc::new(SqliteStore::open(path)?),
            BackendConfig::Remote {
                url,
                api_key,
                poll_interval_ms,
            } => Arc::new(RestStore::new(url, api_key)?.with_poll_interval(Duration::from_millis(*poll_interval_ms))),
        };
        log::info!("using {} store", store.backend_name());
        Ok(store)
    }

    pub fn open_repository(&self) -> DomainResult<ProjectRepository> {
        Ok(ProjectRepository::new(self.open_store()?).with_counter_strategy(self.counter_strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                path: dir.path().join(DEFAULT_DB_FILE_NAME)
            }
        );
        assert_eq!(config.counter_strategy, CounterStrategy::Atomic);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            backend: BackendConfig::Remote {
                url: "https://example.supabase.co".into(),
                api_key: "anon".into(),
                poll_interval_ms: 500,
            },
            counter_strategy: CounterStrategy::ReadModifyWrite,
        };

        config.save(dir.path()).unwrap();

        assert_eq!(AppConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_parses_hand_written_config() {
        let config: AppConfig = serde_json::from_str(
            r#"{"backend": {"kind": "remote", "url": "https://x.example", "api_key": "k"}}"#,
        )
        .unwrap();
        assert!(matches!(
            config.backend,
            BackendConfig::Remote { poll_interval_ms: 3000, .. }
        ));
        assert_eq!(config.counter_strategy, CounterStrategy::Atomic);
    }

    #[test]
    fn test_rejects_bad_remote() {
        let config = AppConfig {
            backend: BackendConfig::Remote {
                url: "ftp://nope".into(),
                api_key: "k".into(),
                poll_interval_ms: 1000,
            },
            counter_strategy: CounterStrategy::Atomic,
        };
        assert!(matches!(config.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_invalid_json_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(AppConfig::path_in(dir.path()), "{ not json").unwrap();
        assert!(matches!(AppConfig::load(dir.path()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_open_repository_uses_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default_for(dir.path());
        config.counter_strategy = CounterStrategy::ReadModifyWrite;

        let repo = config.open_repository().unwrap();

        assert_eq!(repo.counter_strategy(), CounterStrategy::ReadModifyWrite);
        assert_eq!(repo.store().backend_name(), "sqlite");
    }
}
