/// Configuration for the taskboard CLI.
/// Reads config.json from ~/.config/taskboard/config.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use taskboard_core::CoreConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub core: CoreConfig,
    /// Directory holding the store files. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl CliConfig {
    /// `--data-dir` wins over the config file, which wins over the default.
    pub fn resolve_data_dir(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(default_data_dir)
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("taskboard")
}

/// Default config path: ~/.config/taskboard/config.json
pub fn default_config_path() -> PathBuf {
    app_dir(dirs::config_dir()).join("config.json")
}

pub fn default_data_dir() -> PathBuf {
    app_dir(dirs::data_dir()).join("data")
}

/// Load config from path. Returns defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> CliConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                target: "taskboard.cli",
                "Failed to parse config {}: {}",
                path.display(),
                e
            );
            CliConfig::default()
        }),
        Err(_) => {
            log::info!(
                target: "taskboard.cli",
                "No config at {}, using defaults",
                path.display()
            );
            CliConfig::default()
        }
    }
}
