pub mod config_cmd;
pub mod parse;
pub mod run;
pub mod tools;

use std::path::Path;

use anyhow::Context;
use loopwright_config::AppConfig;

/// Load from an explicit path, or the default location with env overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => AppConfig::load().context("Failed to load config"),
    }
}
