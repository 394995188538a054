//! 服务发现配置

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 注册中心故障时的快照策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// 继续提供最后一次成功的快照，只在从未成功时报错
    #[default]
    ServeStale,
    /// 最近一次拉取失败时直接报错
    FailClosed,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "serve_stale" | "stale" => Ok(ErrorPolicy::ServeStale),
            "fail_closed" | "fail" => Ok(ErrorPolicy::FailClosed),
            _ => Err(format!("Unknown error policy: {}", s)),
        }
    }
}

/// 订阅者配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// 服务名称
    pub service_name: String,

    /// 必须全部包含的标签
    #[serde(default)]
    pub tags: Vec<String>,

    /// 是否只返回通过健康检查的实例
    #[serde(default = "default_passing_only")]
    pub passing_only: bool,

    /// 长轮询等待时间（毫秒）
    #[serde(default = "default_wait_time_ms")]
    pub wait_time_ms: u64,

    /// 两次拉取之间的固定间隔（毫秒），用于不支持阻塞查询的注册中心
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,

    /// 注册中心故障时的快照策略
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

fn default_passing_only() -> bool {
    true
}

fn default_wait_time_ms() -> u64 {
    10_000
}

impl SubscriberConfig {
    /// 创建新的订阅者配置
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tags: Vec::new(),
            passing_only: default_passing_only(),
            wait_time_ms: default_wait_time_ms(),
            refresh_interval_ms: None,
            error_policy: ErrorPolicy::default(),
        }
    }

    /// 设置必需标签
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// 设置是否只返回健康实例
    pub fn with_passing_only(mut self, passing_only: bool) -> Self {
        self.passing_only = passing_only;
        self
    }

    /// 设置长轮询等待时间
    pub fn with_wait_time(mut self, wait: Duration) -> Self {
        self.wait_time_ms = wait.as_millis() as u64;
        self
    }

    /// 设置固定刷新间隔
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    /// 设置快照策略
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_ms.map(Duration::from_millis)
    }
}
