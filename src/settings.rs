use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: Backend,
    /// Local backend: where image files are written.
    pub dir: PathBuf,
    /// Local backend: URL prefix for written files. Defaults to `file://<dir>`.
    pub public_base_url: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: String,
    pub api_key: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: Backend::Local,
            dir: PathBuf::from("data/images"),
            public_base_url: None,
            endpoint: None,
            bucket: "question-images".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from("data/qbank.sqlite"),
            storage: StorageSettings::default(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("QBANK")
        .prefix_separator("_")
        .separator("__")
}

/// `path` (or `qbank.toml` in the working directory, if present), then
/// `QBANK_*` variables (`QBANK_DB_PATH`, `QBANK_STORAGE__BACKEND`, ...).
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(p) => File::from(p),
        None => File::with_name("qbank").required(false),
    };
    Config::builder()
        .add_source(file)
        .add_source(environment())
        .build()
        .context("Failed to read settings")?
        .try_deserialize()
        .context("Invalid settings")
}
