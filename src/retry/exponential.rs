use super::RetryPolicy;
use crate::error::EndpointError;
use std::time::Duration;

/// 指数退避重试策略
///
/// 第 n 次失败后等待 `base_delay * 2^(n-1)`，不超过 `max_delay`。
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&self, _attempt: usize, error: &EndpointError) -> bool {
        // 只对可重试的错误进行重试
        error.is_retryable()
    }

    fn backoff_duration(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}
