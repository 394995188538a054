//! 弹性组件
//!
//! 熔断器和令牌桶的具体算法隐藏在 [`Breaker`] 和 [`Limiter`] 两个 trait 之后，
//! 中间件只依赖 trait，可以替换为任何实现。

pub mod breaker;
pub mod token_bucket;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use token_bucket::{RateLimitConfig, RateLimitMode, TokenBucket, TokioClock};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// 正常放行
    Closed,
    /// 直接拒绝，等待冷却
    Open,
    /// 放行有限的试探调用
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// 一次受保护调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    /// 不计入统计（调用被取消等），只归还半开状态的试探名额
    Ignored,
}

/// 熔断器签发的调用许可
///
/// 记录签发时熔断器所处的代。每次状态切换都会进入新的一代，
/// 旧一代许可的结果不再影响状态机。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// 熔断器 trait
pub trait Breaker: Send + Sync {
    /// 申请调用许可；熔断时返回 `CircuitOpen`
    fn acquire(&self) -> Result<Ticket>;

    /// 记录调用结果，每次成功的 `acquire` 对应一次 `record`
    fn record(&self, ticket: Ticket, outcome: Outcome);

    /// 当前状态
    fn state(&self) -> CircuitState;
}

impl<B: Breaker + ?Sized> Breaker for Arc<B> {
    fn acquire(&self) -> Result<Ticket> {
        (**self).acquire()
    }

    fn record(&self, ticket: Ticket, outcome: Outcome) {
        (**self).record(ticket, outcome)
    }

    fn state(&self) -> CircuitState {
        (**self).state()
    }
}

/// 限流器 trait
pub trait Limiter: Send + Sync {
    /// 尝试获取一个令牌；令牌不足时返回距离下一个令牌可用的时间，不消耗令牌
    fn check(&self) -> std::result::Result<(), Duration>;
}

impl<L: Limiter + ?Sized> Limiter for Arc<L> {
    fn check(&self) -> std::result::Result<(), Duration> {
        (**self).check()
    }
}
