//! Connection settings for the row store.
//!
//! One `table` names the canonical table for every operation, reads and
//! writes alike.

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TABLE: &str = "todos";

pub const ENV_URL: &str = "TODO_STORE_URL";
pub const ENV_KEY: &str = "TODO_STORE_KEY";
pub const ENV_TABLE: &str = "TODO_STORE_TABLE";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            table: default_table(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Load from `TODO_STORE_URL`, `TODO_STORE_KEY` and `TODO_STORE_TABLE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = get(ENV_URL).ok_or(ConfigError::MissingVar(ENV_URL))?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: ENV_URL,
                reason: format!("`{base_url}` is not an http(s) URL"),
            });
        }

        Ok(Self {
            base_url,
            api_key: get(ENV_KEY),
            table: get(ENV_TABLE).unwrap_or_else(default_table),
        })
    }
}
