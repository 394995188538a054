use super::RetryPolicy;
use crate::error::EndpointError;
use std::time::Duration;

/// 固定延迟重试策略
#[derive(Debug, Clone)]
pub struct FixedRetryPolicy {
    delay: Duration,
}

impl FixedRetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryPolicy for FixedRetryPolicy {
    fn should_retry(&self, _attempt: usize, error: &EndpointError) -> bool {
        // 只对可重试的错误进行重试
        error.is_retryable()
    }

    fn backoff_duration(&self, _attempt: usize) -> Duration {
        self.delay
    }
}
