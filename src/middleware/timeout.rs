use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::endpoint::{BoxEndpoint, Endpoint, Middleware};
use crate::error::Result;

/// 超时中间件
///
/// 为下游调用收紧截止时间；调用方的截止时间更早时以调用方为准。
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    timeout: Duration,
}

impl TimeoutMiddleware {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for TimeoutMiddleware
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        Arc::new(Timeout {
            next,
            timeout: self.timeout,
        })
    }
}

struct Timeout<Req, Resp> {
    next: BoxEndpoint<Req, Resp>,
    timeout: Duration,
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for Timeout<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        let ctx = ctx.with_timeout(self.timeout);
        ctx.run(self.next.call(ctx.clone(), req)).await
    }
}
