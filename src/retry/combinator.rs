//! 重试组合器

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AlwaysRetry, RetryPolicy};
use crate::balancer::Balancer;
use crate::context::Context;
use crate::endpoint::{BoxEndpoint, Endpoint};
use crate::error::{EndpointError, Result};

/// 重试组合器
///
/// 在 `max_attempts` 次和 `timeout` 总时长之内反复向负载均衡器要一个
/// Endpoint 并调用它。每次尝试都可能选中不同的实例。
/// `max_attempts` 为 0 时按 1 处理。
/// 调用之间不共享可变状态，并发调用彼此独立。
pub struct Retry<Req, Resp> {
    max_attempts: usize,
    timeout: Duration,
    balancer: Arc<dyn Balancer<Req, Resp>>,
    policy: Arc<dyn RetryPolicy>,
}

impl<Req, Resp> Retry<Req, Resp> {
    pub fn new<B>(max_attempts: usize, timeout: Duration, balancer: B) -> Self
    where
        B: Balancer<Req, Resp> + 'static,
    {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            balancer: Arc::new(balancer),
            policy: Arc::new(AlwaysRetry),
        }
    }

    /// 设置重试策略
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: RetryPolicy + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// 构建重试 Endpoint
///
/// ```rust
/// use std::time::Duration;
/// use flare_endpoint::balancer::RoundRobin;
/// use flare_endpoint::discovery::FixedSubscriber;
/// use flare_endpoint::endpoint::{boxed, endpoint_fn};
/// use flare_endpoint::retry::retry;
/// use flare_endpoint::Context;
///
/// let backend = boxed(endpoint_fn(|_ctx: Context, n: u32| async move { Ok(n + 1) }));
/// let balancer = RoundRobin::new(FixedSubscriber::new(vec![backend]));
/// let client = retry(3, Duration::from_millis(500), balancer);
/// ```
pub fn retry<Req, Resp, B>(max_attempts: usize, timeout: Duration, balancer: B) -> BoxEndpoint<Req, Resp>
where
    B: Balancer<Req, Resp> + 'static,
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
{
    Arc::new(Retry::new(max_attempts, timeout, balancer))
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for Retry<Req, Resp>
where
    Req: Clone + Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        // 调用方的截止时间更早时以调用方为准
        let ctx = ctx.with_timeout(self.timeout);
        let mut errors = Vec::new();
        let mut attempts = 0;
        let mut last_failure = None;

        // 上下文结束、负载均衡器无可用实例或退避等待被打断时停止
        let stop = loop {
            if let Some(err) = ctx.done_error() {
                break err;
            }

            let endpoint = match self.balancer.endpoint() {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    debug!(attempt = attempts + 1, error = %err, "balancer returned no endpoint");
                    break err;
                }
            };

            attempts += 1;
            let attempt_req = req.clone();
            let err = match ctx.run(endpoint.call(ctx.clone(), attempt_req)).await {
                Ok(resp) => {
                    if attempts > 1 {
                        debug!(attempt = attempts, "retry succeeded");
                    }
                    return Ok(resp);
                }
                Err(err) => err,
            };

            warn!(
                attempt = attempts,
                max_attempts = self.max_attempts,
                error = %err,
                "attempt failed"
            );

            errors.push(err.clone());
            if attempts >= self.max_attempts || !self.policy.should_retry(attempts, &err) {
                return Err(EndpointError::retry_exhausted(attempts, err, errors));
            }
            last_failure = Some(err);

            let delay = self.policy.backoff_duration(attempts);
            if !delay.is_zero() {
                if let Err(err) = ctx.sleep(delay).await {
                    break err;
                }
            }
        };

        errors.push(stop.clone());
        let last = last_failure.unwrap_or(stop);
        Err(EndpointError::retry_exhausted(attempts, last, errors))
    }
}
