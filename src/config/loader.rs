// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::defaults::DEFAULT_CONFIG;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "Assetpipe.toml";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_str(&contents)
}

/// Deserialize a TOML string.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks task fields, unknown `after` references, cycles and watch rules.
///
/// Composition into per-mode stages (including output overlap checks) is done
/// afterwards by [`crate::dag::compose_pipeline`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    ConfigFile::try_from(raw_config)
}

/// The built-in pipeline used when no config file exists.
pub fn default_config() -> Result<ConfigFile> {
    ConfigFile::try_from(parse_str(DEFAULT_CONFIG)?)
}

/// Resolve the configuration the way the CLI does:
///
/// - an explicit path must exist;
/// - without one, `Assetpipe.toml` is used when present, the built-in
///   pipeline otherwise.
pub fn resolve(explicit: Option<&Path>) -> Result<(ConfigFile, Option<PathBuf>)> {
    match explicit {
        Some(path) => Ok((load_and_validate(path)?, Some(path.to_path_buf()))),
        None => {
            let path = default_config_path();
            if path.is_file() {
                Ok((load_and_validate(&path)?, Some(path)))
            } else {
                info!(
                    "no {} found; using the built-in pipeline",
                    DEFAULT_CONFIG_FILE
                );
                Ok((default_config()?, None))
            }
        }
    }
}

/// Helper to resolve the default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
