use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::endpoint::{BoxEndpoint, Endpoint, Middleware};
use crate::error::{EndpointError, Result};
use crate::resilience::{Limiter, RateLimitConfig, RateLimitMode, TokenBucket};

/// 限流中间件
///
/// 拒绝模式下令牌耗尽直接返回 `RateLimited`，不调用下游；
/// 等待模式下在上下文截止时间内等待令牌，等不到同样返回 `RateLimited`。
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<dyn Limiter>,
    mode: RateLimitMode,
}

impl RateLimitMiddleware {
    /// 令牌耗尽时拒绝
    pub fn rejecting<L>(limiter: L) -> Self
    where
        L: Limiter + 'static,
    {
        Self {
            limiter: Arc::new(limiter),
            mode: RateLimitMode::Reject,
        }
    }

    /// 令牌耗尽时等待
    pub fn delaying<L>(limiter: L) -> Self
    where
        L: Limiter + 'static,
    {
        Self {
            limiter: Arc::new(limiter),
            mode: RateLimitMode::Delay,
        }
    }

    /// 根据配置构建令牌桶限流中间件
    pub fn from_config(config: &RateLimitConfig) -> anyhow::Result<Self> {
        Ok(Self {
            limiter: Arc::new(TokenBucket::from_config(config)?),
            mode: config.mode,
        })
    }

    pub fn mode(&self) -> RateLimitMode {
        self.mode
    }
}

impl<Req, Resp> Middleware<Req, Resp> for RateLimitMiddleware
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        Arc::new(RateLimited {
            next,
            limiter: self.limiter.clone(),
            mode: self.mode,
        })
    }
}

struct RateLimited<Req, Resp> {
    next: BoxEndpoint<Req, Resp>,
    limiter: Arc<dyn Limiter>,
    mode: RateLimitMode,
}

impl<Req, Resp> RateLimited<Req, Resp> {
    async fn wait_for_token(&self, ctx: &Context) -> Result<()> {
        loop {
            let wait = match self.limiter.check() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };
            if ctx.remaining().is_some_and(|remaining| remaining < wait) {
                return Err(EndpointError::RateLimited);
            }
            debug!(wait_ms = wait.as_millis() as u64, "waiting for rate limit token");
            ctx.sleep(wait).await?;
        }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for RateLimited<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        match self.mode {
            RateLimitMode::Reject => {
                if self.limiter.check().is_err() {
                    return Err(EndpointError::RateLimited);
                }
            }
            RateLimitMode::Delay => self.wait_for_token(&ctx).await?,
        }
        self.next.call(ctx, req).await
    }
}
