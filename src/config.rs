//! Runtime configuration.

use std::path::Path;

use actor_journal::DEFAULT_JOURNAL_CAPACITY;
use actor_site_policy::PolicyConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed loading configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Settings for one actor runtime. Loaded from an optional file overlaid
/// with `ACTOR_`-prefixed environment variables (e.g.
/// `ACTOR_POLICY__ALLOW_BY_DEFAULT=false`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    pub journal_capacity: usize,
    pub policy: PolicyConfig,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            policy: PolicyConfig::default(),
        }
    }
}

impl ActorConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("ACTOR").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
