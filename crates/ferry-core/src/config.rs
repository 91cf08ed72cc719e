//! Transport configuration, loaded from TOML.
//!
//! ```toml
//! root = "/var/lib/ferry"
//! queues = ["inbox", "billing"]
//! max_attempts = 4
//! poll_interval_ms = 500
//! ```
//!
//! Every key is optional; missing keys take the values of
//! `FerryConfig::default()`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::quarantine::QuarantinePolicy;
use crate::transport::QueueLayout;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FerryConfig {
    /// Directory holding every queue and side store.
    pub root: PathBuf,
    pub queues: Vec<String>,
    pub poison_suffix: String,
    pub dead_letter_suffix: String,
    /// Failure count at which a message is dead-lettered.
    pub max_attempts: u32,
    /// Sleep after an empty poll or a deferred message.
    pub poll_interval_ms: u64,
    /// Sleep after a queue-level error.
    pub error_backoff_ms: u64,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("ferry-data"),
            queues: vec!["inbox".to_string()],
            poison_suffix: QueueLayout::DEFAULT_POISON_SUFFIX.to_string(),
            dead_letter_suffix: QueueLayout::DEFAULT_DEAD_LETTER_SUFFIX.to_string(),
            max_attempts: QuarantinePolicy::DEFAULT_MAX_ATTEMPTS,
            poll_interval_ms: 500,
            error_backoff_ms: 5_000,
        }
    }
}

impl FerryConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.is_empty() {
            return Err(ConfigError::Invalid("at least one queue is required".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.poison_suffix.is_empty()
            || self.dead_letter_suffix.is_empty()
            || self.poison_suffix == self.dead_letter_suffix
        {
            return Err(ConfigError::Invalid(
                "poison_suffix and dead_letter_suffix must be non-empty and distinct".into(),
            ));
        }

        let mut names = HashSet::new();
        for layout in self.layouts() {
            for name in [layout.queue, layout.poison, layout.dead_letter] {
                validate_queue_name(&name)?;
                if !names.insert(name.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "storage name `{name}` is used twice"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn layouts(&self) -> Vec<QueueLayout> {
        self.queues
            .iter()
            .map(|queue| QueueLayout::with_suffixes(queue, &self.poison_suffix, &self.dead_letter_suffix))
            .collect()
    }

    pub fn layout(&self, queue: &str) -> QueueLayout {
        QueueLayout::with_suffixes(queue, &self.poison_suffix, &self.dead_letter_suffix)
    }

    pub fn quarantine_policy(&self) -> QuarantinePolicy {
        QuarantinePolicy::new(self.max_attempts)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

fn validate_queue_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != "..";
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("invalid queue name `{name}`")))
    }
}
