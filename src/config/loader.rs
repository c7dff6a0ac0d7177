use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Files picked up from the working directory when `--config` is absent,
/// in order of preference.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["volley.toml", "volley.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) => Err(ConfigError::UnsupportedExtension {
                ext: ext.to_owned(),
            }),
            None => Err(ConfigError::MissingExtension),
        }
    }

    fn parse<T: DeserializeOwned>(self, path: &Path, content: &str) -> Result<T, ConfigError> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|err| ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            }),
            Self::Json => serde_json::from_str(content).map_err(|err| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            }),
        }
    }
}

/// Loads the run's config file, if there is one.
///
/// An explicit `--config` path must exist. Without one, the first of
/// [`DEFAULT_CONFIG_FILES`] present in the working directory is used.
///
/// # Errors
///
/// Returns an error when the chosen file cannot be read or parsed.
pub fn load_config(explicit: Option<&str>) -> AppResult<Option<ConfigFile>> {
    let Some(path) = resolve_config_path(explicit, Path::new(".")) else {
        debug!("No config file; using command-line values only");
        return Ok(None);
    };
    let config = load_config_file(&path)?;
    info!("Loaded config from {}", path.display());
    Ok(Some(config))
}

/// First default config file present in the working directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_in(Path::new("."))
}

pub(crate) fn resolve_config_path(explicit: Option<&str>, dir: &Path) -> Option<PathBuf> {
    explicit.map(PathBuf::from).or_else(|| default_config_in(dir))
}

fn default_config_in(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

pub(crate) fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    let format = ConfigFormat::from_path(path).map_err(AppError::config)?;
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    format.parse(path, &content).map_err(AppError::config)
}
