//! `loopwright config`: inspect the effective configuration.

use std::path::Path;

use loopwright_config::AppConfig;

pub fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    println!("{}", config.redacted_toml());
    if config.has_api_key() {
        println!("# api_key is set (hidden)");
    }
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}
