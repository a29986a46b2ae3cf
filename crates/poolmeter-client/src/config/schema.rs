use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use poolmeter_core::error::{PoolMeterError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PoolMeterError::UnsupportedVersion);
        }
        self.pool.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// 0 means a single non-blocking attempt.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// 0 disables idle eviction.
    #[serde(default)]
    pub max_idle_ms: u64,

    /// Tags attached to every pool and client metric.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            max_idle_ms: 0,
            tags: BTreeMap::new(),
        }
    }
}

impl PoolConfig {
    /// Config with the given capacity and defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PoolMeterError::BadConfig("pool.name must not be empty".into()));
        }
        if !(1..=65_536).contains(&self.capacity) {
            return Err(PoolMeterError::BadConfig(
                "pool.capacity must be between 1 and 65536".into(),
            ));
        }
        if self.acquire_timeout_ms > 600_000 {
            return Err(PoolMeterError::BadConfig(
                "pool.acquire_timeout_ms must be at most 600000".into(),
            ));
        }
        if self.tags.keys().any(|k| k.is_empty()) {
            return Err(PoolMeterError::BadConfig("pool.tags keys must not be empty".into()));
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn max_idle(&self) -> Option<Duration> {
        (self.max_idle_ms > 0).then(|| Duration::from_millis(self.max_idle_ms))
    }

    /// Tags as borrowed pairs, in the form the registry takes them.
    pub fn tag_pairs(&self) -> Vec<(&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_export_interval_ms")]
    pub export_interval_ms: u64,

    #[serde(default = "default_logging_exporter")]
    pub logging_exporter: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            export_interval_ms: default_export_interval_ms(),
            logging_exporter: default_logging_exporter(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=3_600_000).contains(&self.export_interval_ms) {
            return Err(PoolMeterError::BadConfig(
                "metrics.export_interval_ms must be between 100 and 3600000".into(),
            ));
        }
        Ok(())
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.export_interval_ms)
    }
}

fn default_name() -> String {
    "default".into()
}
fn default_capacity() -> usize {
    100
}
fn default_acquire_timeout_ms() -> u64 {
    5000
}
fn default_export_interval_ms() -> u64 {
    10000
}
fn default_logging_exporter() -> bool {
    true
}
