//! Config file and log locations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use scribble_edit::collaboration::ServerConfig;

const PROJECT_QUALIFIER: &str = "com";
const PROJECT_ORGANIZATION: &str = "GitHub";
const PROJECT_APPLICATION: &str = "scribble";

/// Name of the config file looked up in the config dir when `--config` is absent.
pub const CONFIG_FILE: &str = "scribble.toml";

pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from(PROJECT_QUALIFIER, PROJECT_ORGANIZATION, PROJECT_APPLICATION).map(|p| p.config_dir().to_path_buf())
}

pub fn log_dir() -> Option<PathBuf> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok()?;
    }
    Some(dir)
}

/// Read the server config from `explicit`, or from the default config file if it
/// exists. Missing keys keep their defaults.
pub fn load_server_config(explicit: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_dir().map(|dir| dir.join(CONFIG_FILE)) {
            Some(path) if path.exists() => path,
            _ => return Ok(ServerConfig::default()),
        },
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config = parse_server_config(&text).with_context(|| format!("parsing {}", path.display()))?;
    log::info!("Loaded server config from {}", path.display());
    Ok(config)
}

pub fn parse_server_config(text: &str) -> Result<ServerConfig, toml::de::Error> {
    toml::from_str(text)
}
