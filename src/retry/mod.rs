//! 重试模块
//!
//! [`Retry`] 把负载均衡器包装成单个 Endpoint，在次数和总时长预算内重试；
//! [`RetryPolicy`] 决定某个错误是否值得重试以及两次尝试之间的等待时间。

pub mod combinator;
pub mod exponential;
pub mod fixed;

pub use combinator::{retry, Retry};
pub use exponential::ExponentialBackoffPolicy;
pub use fixed::FixedRetryPolicy;

use std::time::Duration;

use crate::error::EndpointError;

/// 重试策略 trait
pub trait RetryPolicy: Send + Sync {
    /// 第 `attempt` 次尝试（从 1 开始）失败后是否继续重试
    fn should_retry(&self, attempt: usize, error: &EndpointError) -> bool;

    /// 第 `attempt` 次尝试失败后的等待时间
    fn backoff_duration(&self, attempt: usize) -> Duration;
}

/// 默认策略：任何错误都重试，不等待
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl RetryPolicy for AlwaysRetry {
    fn should_retry(&self, _attempt: usize, _error: &EndpointError) -> bool {
        true
    }

    fn backoff_duration(&self, _attempt: usize) -> Duration {
        Duration::ZERO
    }
}
