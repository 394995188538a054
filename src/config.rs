//! 配置
//!
//! 所有可调参数的 TOML 配置，时长字段均以毫秒为单位。

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::balancer::Strategy;
use crate::discovery::SubscriberConfig;
use crate::logging::LoggingConfig;
use crate::resilience::{CircuitBreakerConfig, RateLimitConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub balancer: BalancerConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: Option<RateLimitConfig>,
    /// 按名称索引的订阅者配置
    #[serde(default)]
    pub subscribers: HashMap<String, SubscriberConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_retry_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_timeout_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_ms: default_retry_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BalancerConfig {
    #[serde(default)]
    pub strategy: Strategy,
    /// 随机策略的种子，未设置时使用系统熵源
    pub seed: Option<u64>,
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 按名称获取订阅者配置
    pub fn subscriber(&self, name: &str) -> Option<&SubscriberConfig> {
        self.subscribers.get(name)
    }
}
