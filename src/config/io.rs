use super::models::EngineConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load the engine config from disk. A missing or unreadable file yields the
/// defaults so the engine can always start.
pub fn load_config(path: &Path) -> EngineConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded engine config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return EngineConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(config) => {
            debug!("Parsed configuration from disk");
            config
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            EngineConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<EngineConfig> {
    let tables: ConfigTables = toml::from_str(contents).context("Parsing config TOML")?;
    Ok(EngineConfig::from(tables).sanitized())
}

pub fn serialize_config(config: &EngineConfig) -> Result<String> {
    toml::to_string(&ConfigTables::from(config)).context("Serializing config")
}
