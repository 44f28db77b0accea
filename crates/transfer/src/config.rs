use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::link::LinkOptions;
use crate::match_engine::MatchOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid match options: {0}")]
    Match(#[from] crate::match_engine::MatchError),
}

/// File-level configuration: a `[match]` table and a `[link]` table, both optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    #[serde(rename = "match")]
    pub matching: MatchOptions,
    pub link: LinkOptions,
}

impl TransferConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: TransferConfig = toml::from_str(toml_content)?;
        config.matching.validate()?;
        Ok(config)
    }
}
