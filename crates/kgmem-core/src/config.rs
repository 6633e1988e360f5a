//! Configuration management for kgmem.
//!
//! Configuration is loaded from (in priority order):
//! 1. `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`
//! 2. Environment variables (`KGMEM__` prefix, `__` separator)
//! 3. Config file (`kgmem.toml` by default)
//! 4. Defaults

use serde::Deserialize;

use crate::error::CoreError;

/// Environment variables that override the `[neo4j]` section directly.
const NEO4J_ENV_OVERRIDES: [(&str, &str); 3] = [
    ("neo4j.uri", "NEO4J_URI"),
    ("neo4j.user", "NEO4J_USER"),
    ("neo4j.password", "NEO4J_PASSWORD"),
];

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub neo4j: Neo4jSettings,
}

/// Connection parameters for the backing graph store.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Upper bound on pooled bolt connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Rows pulled per round trip.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

impl Settings {
    /// Load settings from `{file_prefix}.toml` and the process environment.
    pub fn load(file_prefix: &str) -> Result<Self, CoreError> {
        Self::load_with(file_prefix, |key| std::env::var(key).ok())
    }

    /// Load settings, resolving the `NEO4J_*` overrides through `lookup`.
    pub fn load_with<F>(file_prefix: &str, lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("KGMEM")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, var) in NEO4J_ENV_OVERRIDES {
            builder = builder.set_override_option(key, lookup(var))?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        tracing::debug!(uri = %settings.neo4j.uri, user = %settings.neo4j.user, "Loaded settings");
        Ok(settings)
    }
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("missing");
        let settings = Settings::load_with(prefix.to_str().unwrap(), no_env).unwrap();
        assert_eq!(settings.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(settings.neo4j.user, "neo4j");
        assert_eq!(settings.neo4j.max_connections, 16);
        assert_eq!(settings.neo4j.fetch_size, 256);
    }

    #[test]
    fn test_file_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kgmem.toml"),
            "[neo4j]\nuri = \"bolt://graph:7687\"\nuser = \"memory\"\nfetch_size = 64\n",
        )
        .unwrap();

        let prefix = dir.path().join("kgmem");
        let settings = Settings::load_with(prefix.to_str().unwrap(), no_env).unwrap();
        assert_eq!(settings.neo4j.uri, "bolt://graph:7687");
        assert_eq!(settings.neo4j.user, "memory");
        assert_eq!(settings.neo4j.password, "neo4j");
        assert_eq!(settings.neo4j.fetch_size, 64);
    }

    #[test]
    fn test_neo4j_variables_override_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kgmem.toml"),
            "[neo4j]\nuri = \"bolt://graph:7687\"\n",
        )
        .unwrap();

        let prefix = dir.path().join("kgmem");
        let settings = Settings::load_with(prefix.to_str().unwrap(), |key| match key {
            "NEO4J_URI" => Some("neo4j://override:7687".to_string()),
            "NEO4J_PASSWORD" => Some("s3cret".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.neo4j.uri, "neo4j://override:7687");
        assert_eq!(settings.neo4j.password, "s3cret");
        assert_eq!(settings.neo4j.user, "neo4j");
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kgmem.toml"), "[neo4j]\nfetch_size = \"many\"\n").unwrap();

        let prefix = dir.path().join("kgmem");
        let err = Settings::load_with(prefix.to_str().unwrap(), no_env).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error:"));
    }
}
