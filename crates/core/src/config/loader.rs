use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the TOML file to load.
pub const CONFIG_PATH_VAR: &str = "STILLREEL_CONFIG";

/// Prefix of environment overrides; `__` separates nested keys.
const ENV_PREFIX: &str = "STILLREEL_";

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Config file location: `$STILLREEL_CONFIG`, or `config.toml` in the
/// working directory.
pub fn config_path_from_env() -> PathBuf {
    std::env::var_os(CONFIG_PATH_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Reads `path` and layers `STILLREEL_*` variables over it.
///
/// `STILLREEL_ENGINE__FFMPEG_PATH=/opt/ffmpeg` sets `engine.ffmpeg_path`.
/// The path variable itself is not a config key and is ignored here.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["CONFIG"]))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parses TOML without consulting the environment.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
