//! Karma server configuration file.
//!
//! ```toml
//! database = "edkarma.sqlite3"
//!
//! [api_keys]
//! 3f1c...e9 = "staff-member"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_DATABASE: &str = "edkarma.sqlite3";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Relative paths are resolved against the config file's directory.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// API key -> user name.
    #[serde(default)]
    pub api_keys: BTreeMap<String, String>,
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            api_keys: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn database_path(&self, config_path: &Path) -> PathBuf {
        if self.database.is_absolute() {
            return self.database.clone();
        }
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.database)
    }

    /// Issues a key for every user that does not have one yet and returns
    /// the new (user, key) pairs. Existing keys are kept.
    pub fn add_users<'a>(&mut self, users: impl IntoIterator<Item = &'a str>) -> Vec<(String, String)> {
        let mut issued = Vec::new();
        for user in users.into_iter().map(str::trim).filter(|u| !u.is_empty()) {
            if self.api_keys.values().any(|u| u == user) {
                continue;
            }
            let mut key = generate_api_key();
            while self.api_keys.contains_key(&key) {
                key = generate_api_key();
            }
            self.api_keys.insert(key.clone(), user.to_string());
            issued.push((user.to_string(), key));
        }
        issued
    }
}

/// 32 alphanumeric characters.
pub fn generate_api_key() -> String {
    Uuid::new_v4().simple().to_string()
}
