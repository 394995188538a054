//! 令牌桶限流器
//!
//! 基于 `governor` 的 GCRA 实现。时钟取自 `tokio::time::Instant`，
//! 暂停的测试时钟同样驱动令牌补充。

use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as _};
use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};

use super::Limiter;

/// 令牌耗尽时的处理方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// 直接拒绝
    #[default]
    Reject,
    /// 在上下文截止时间内等待令牌
    Delay,
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// 每秒补充的令牌数
    pub requests_per_second: f64,

    /// 突发容量（桶大小）
    pub burst_size: u32,

    /// 令牌耗尽时的处理方式
    #[serde(default)]
    pub mode: RateLimitMode,
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
            mode: RateLimitMode::default(),
        }
    }

    /// 每秒 `rps` 个请求，突发容量为速率的两倍
    pub fn per_second(rps: f64) -> Self {
        let burst_size = (rps * 2.0).ceil() as u32;
        Self::new(rps, burst_size)
    }

    pub fn per_minute(rpm: u32) -> Self {
        Self::per_second(rpm as f64 / 60.0)
    }

    pub fn with_mode(mut self, mode: RateLimitMode) -> Self {
        self.mode = mode;
        self
    }
}

/// 以 tokio 时间为准的 governor 时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<Instant>>;

/// 令牌桶
pub struct TokenBucket {
    requests_per_second: f64,
    burst_size: u32,
    limiter: DirectLimiter,
}

impl TokenBucket {
    /// 创建满桶
    ///
    /// # Errors
    /// 速率不是正的有限数或突发容量为 0 时返回错误
    pub fn new(requests_per_second: f64, burst_size: u32) -> anyhow::Result<Self> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(anyhow!("invalid rate {requests_per_second}: must be positive"));
        }
        let period = Duration::try_from_secs_f64(1.0 / requests_per_second)
            .with_context(|| format!("rate {requests_per_second} is too low"))?;
        let quota = Quota::with_period(period)
            .with_context(|| format!("rate {requests_per_second} is too high"))?
            .allow_burst(NonZeroU32::new(burst_size).with_context(|| anyhow!("burst is zero"))?);

        Ok(Self {
            requests_per_second,
            burst_size,
            limiter: RateLimiter::direct_with_clock(quota, TokioClock),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> anyhow::Result<Self> {
        Self::new(config.requests_per_second, config.burst_size)
    }

    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    pub fn burst_size(&self) -> u32 {
        self.burst_size
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("requests_per_second", &self.requests_per_second)
            .field("burst_size", &self.burst_size)
            .finish()
    }
}

impl Limiter for TokenBucket {
    fn check(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.limiter.clock().now()))
    }
}
