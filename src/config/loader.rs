use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    #[serde(rename = "storageLocation")]
    pub storage_location: Option<PathBuf>,
    #[serde(rename = "defaultEnvironment")]
    pub default_environment: Option<String>,
    #[serde(rename = "import")]
    pub import: ImportConfig,
}

/// Header rules applied to every imported request.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    #[serde(rename = "includeHeaders")]
    pub include_headers: Option<Vec<String>>,
    #[serde(rename = "excludeHeaders")]
    pub exclude_headers: Option<Vec<String>>,
    #[serde(rename = "appendHeaders")]
    pub append_headers: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
}

pub fn load_config(dir: &Path) -> Result<Option<LoadedConfig>> {
    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("reading settings {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing settings {}", path.display()))?;

    tracing::debug!(path = %path.display(), "loaded settings");
    Ok(Some(LoadedConfig { config, path }))
}
