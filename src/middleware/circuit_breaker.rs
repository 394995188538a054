use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::endpoint::{BoxEndpoint, Endpoint, Middleware};
use crate::error::{EndpointError, Result};
use crate::resilience::{Breaker, CircuitBreaker, CircuitBreakerConfig, Outcome, Ticket};

/// 熔断中间件
///
/// 熔断时直接返回 `CircuitOpen`，不调用下游。通常每个远端目标单独包一层
/// （在工厂里完成），重试在目标之间进行，一个目标熔断不会阻止尝试其他实例。
#[derive(Clone)]
pub struct CircuitBreakerMiddleware {
    breaker: Arc<dyn Breaker>,
}

impl CircuitBreakerMiddleware {
    pub fn new<B>(breaker: B) -> Self
    where
        B: Breaker + 'static,
    {
        Self {
            breaker: Arc::new(breaker),
        }
    }

    /// 使用默认熔断器实现
    pub fn from_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::new(CircuitBreaker::new(name, config))
    }

    pub fn breaker(&self) -> &Arc<dyn Breaker> {
        &self.breaker
    }
}

impl<Req, Resp> Middleware<Req, Resp> for CircuitBreakerMiddleware
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        Arc::new(Guarded {
            next,
            breaker: self.breaker.clone(),
        })
    }
}

struct Guarded<Req, Resp> {
    next: BoxEndpoint<Req, Resp>,
    breaker: Arc<dyn Breaker>,
}

/// 调用 future 被丢弃时记录为 `Ignored`，归还半开名额
struct Permit<'a> {
    breaker: &'a dyn Breaker,
    ticket: Ticket,
    recorded: bool,
}

impl Permit<'_> {
    fn record(mut self, outcome: Outcome) {
        self.breaker.record(self.ticket, outcome);
        self.recorded = true;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.record(self.ticket, Outcome::Ignored);
        }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for Guarded<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        let ticket = self.breaker.acquire()?;
        let permit = Permit {
            breaker: &*self.breaker,
            ticket,
            recorded: false,
        };

        let result = self.next.call(ctx, req).await;
        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(EndpointError::Cancelled) => Outcome::Ignored,
            Err(_) => Outcome::Failure,
        };
        permit.record(outcome);
        result
    }
}
