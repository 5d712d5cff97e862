//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional TOML file overlaid with `TREEVAULT__*` environment variables.
//! Every section has defaults, so an empty configuration is valid.

pub mod database;
pub mod groups;
pub mod logging;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::groups::GroupsConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::StorageConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata backend settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// On-disk storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Task pipeline settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Group membership provider settings.
    #[serde(default)]
    pub groups: GroupsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The file is optional. Environment variables prefixed with
    /// `TREEVAULT__` override file values, using `__` as the section separator
    /// (for example `TREEVAULT__DATABASE__URL`).
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TREEVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("does/not/exist/treevault").expect("load");
        assert_eq!(config.database.backend, "postgres");
        assert_eq!(config.storage.index_dir_suffix, ".index");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.groups.memberships.is_empty());
    }

    #[test]
    fn test_toml_sections_override_defaults() {
        let dir = std::env::temp_dir().join(format!("treevault-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let file = dir.join("treevault.toml");
        std::fs::write(
            &file,
            r#"
[database]
backend = "memory"

[groups]
cache_ttl_seconds = 5

[groups.memberships]
"0190a0d2-0000-7000-8000-000000000001" = ["G1", "G2"]
"#,
        )
        .expect("write");

        let config = AppConfig::load(file.to_str().expect("utf8")).expect("load");
        assert_eq!(config.database.backend, "memory");
        assert_eq!(config.groups.cache_ttl_seconds, 5);
        assert_eq!(
            config.groups.memberships["0190a0d2-0000-7000-8000-000000000001"],
            vec!["G1".to_string(), "G2".to_string()]
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
