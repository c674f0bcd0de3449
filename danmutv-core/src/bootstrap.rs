//! Configuration loading

use anyhow::Result;
use tracing::info;

use crate::Config;

/// An explicit `DANMUTV_CONFIG_PATH` wins; otherwise `./config.yaml` is used
/// when it exists.
fn find_config_file() -> Option<String> {
    std::env::var("DANMUTV_CONFIG_PATH")
        .ok()
        .into_iter()
        .chain(std::iter::once("config.yaml".to_string()))
        .find(|path| std::path::Path::new(path).exists())
}

/// Load and validate configuration from a config file, with environment
/// variables layered on top, or from the environment alone when no file is
/// found.
pub fn load_config() -> Result<Config> {
    let config = match find_config_file() {
        Some(path) => {
            eprintln!("Loading config from {path}");
            Config::from_file(&path).unwrap_or_else(|e| {
                eprintln!("Failed to load {path}: {e}, using environment variables");
                Config::from_env().unwrap_or_default()
            })
        }
        None => Config::from_env().unwrap_or_else(|e| {
            eprintln!("Failed to load config from environment: {e}");
            Config::default()
        }),
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            tracing::error!("Config validation error: {}", error);
        }
        anyhow::bail!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        );
    }

    info!("Configuration loaded and validated successfully");

    Ok(config)
}
