mod settings_registry;

pub use settings_registry::{
    apply_env_overrides, FileSettingsRegistry, SettingsError, SettingsRegistry,
    DEFAULT_SETTINGS_PATH, ENV_API_URL, ENV_MODEL, ENV_NUM_PREDICT, ENV_TIMEOUT_SECS,
};
