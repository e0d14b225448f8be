use crate::data::InferenceSettings;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SETTINGS_PATH: &str = "projgen.yml";

pub const ENV_API_URL: &str = "PROJGEN_API_URL";
pub const ENV_MODEL: &str = "PROJGEN_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "PROJGEN_TIMEOUT_SECS";
pub const ENV_NUM_PREDICT: &str = "PROJGEN_NUM_PREDICT";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Source of inference settings
pub trait SettingsRegistry {
    fn load(&self) -> Result<InferenceSettings, SettingsError>;
}

/// Every key is optional; absent keys keep their default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    api_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    num_predict: Option<u32>,
}

/// YAML-backed settings, e.g.
///
/// ```yaml
/// api_url: http://localhost:11434/api
/// model: deepseek-coder-v2:latest
/// timeout_secs: 600
/// num_predict: 4096
/// ```
#[derive(Debug, Clone)]
pub struct FileSettingsRegistry {
    path: PathBuf,
}

impl FileSettingsRegistry {
    /// Uses `projgen.yml` in the working directory when no path is given.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsRegistry for FileSettingsRegistry {
    fn load(&self) -> Result<InferenceSettings, SettingsError> {
        let mut settings = InferenceSettings::default();
        if !self.path.exists() {
            return Ok(settings);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| SettingsError::Read {
            path: self.path.clone(),
            source,
        })?;

        // An empty file parses as null
        if content.trim().is_empty() {
            return Ok(settings);
        }

        let file: SettingsFile =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if let Some(api_url) = file.api_url {
            settings.api_url = api_url;
        }
        if let Some(model) = file.model {
            settings.model = model;
        }
        if let Some(secs) = file.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(num_predict) = file.num_predict {
            settings.num_predict = num_predict;
        }

        Ok(settings)
    }
}

/// Overlays `PROJGEN_*` variables looked up through `lookup`.
///
/// Blank values are ignored.
pub fn apply_env_overrides<F>(
    mut settings: InferenceSettings,
    lookup: F,
) -> Result<InferenceSettings, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(api_url) = get(ENV_API_URL) {
        settings.api_url = api_url;
    }
    if let Some(model) = get(ENV_MODEL) {
        settings.model = model;
    }
    if let Some(value) = get(ENV_TIMEOUT_SECS) {
        settings.timeout = Duration::from_secs(parse_value(ENV_TIMEOUT_SECS, &value)?);
    }
    if let Some(value) = get(ENV_NUM_PREDICT) {
        settings.num_predict = parse_value(ENV_NUM_PREDICT, &value)?;
    }

    Ok(settings)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
