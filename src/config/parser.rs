use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates a configuration file
///
/// ```no_run
/// use std::path::Path;
/// use scent_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Concurrency: {}", config.scheduler.concurrency);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration TOML
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 of the raw configuration text
///
/// Stored in every checkpoint; a resumed run compares it to detect that the
/// configuration changed since the checkpoint was written.
pub fn config_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Hashes a configuration file without parsing it
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(config_hash(&content))
}

/// Loads a configuration and hashes the same bytes it was parsed from
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, config_hash(&content)))
}
