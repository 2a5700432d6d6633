mod loader;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

pub use loader::{load_config, AppConfig, ImportConfig, LoadedConfig, SETTINGS_FILE};

const APP_DIR_NAME: &str = "YAPMC";
const UNIX_DIR_NAME: &str = ".yapmc";

/// Platform default home for settings and stores: `%APPDATA%\YAPMC` on
/// Windows, `~/Library/Application Support/YAPMC` on macOS, `~/.yapmc`
/// elsewhere.
pub fn default_data_dir() -> Result<PathBuf> {
    let dir = if cfg!(any(windows, target_os = "macos")) {
        dirs::data_dir().map(|base| base.join(APP_DIR_NAME))
    } else {
        dirs::home_dir().map(|home| home.join(UNIX_DIR_NAME))
    };
    dir.ok_or_else(|| anyhow!("could not determine a home directory for application data"))
}

/// Where the request and environment stores live: an explicit directory
/// wins, then `storageLocation` from settings, then `default_dir`.
pub fn resolve_data_dir(explicit: Option<&Path>, config: &AppConfig, default_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config.storage_location.clone())
        .unwrap_or_else(|| default_dir.to_path_buf())
}
