use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::Context;
use crate::endpoint::{BoxEndpoint, Endpoint, Middleware};
use crate::error::Result;
use crate::metrics::MetricsSink;

/// 指标中间件
///
/// 把每次调用的方法名、耗时和成败上报给 [`MetricsSink`]。
#[derive(Clone)]
pub struct InstrumentingMiddleware {
    method: Arc<str>,
    sink: Arc<dyn MetricsSink>,
}

impl InstrumentingMiddleware {
    pub fn new<S>(method: impl Into<String>, sink: S) -> Self
    where
        S: MetricsSink + 'static,
    {
        Self {
            method: Arc::from(method.into()),
            sink: Arc::new(sink),
        }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for InstrumentingMiddleware
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        Arc::new(Instrumenting {
            next,
            method: self.method.clone(),
            sink: self.sink.clone(),
        })
    }
}

struct Instrumenting<Req, Resp> {
    next: BoxEndpoint<Req, Resp>,
    method: Arc<str>,
    sink: Arc<dyn MetricsSink>,
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for Instrumenting<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        let start = Instant::now();
        let result = self.next.call(ctx, req).await;
        self.sink
            .observe(&self.method, start.elapsed(), result.is_ok())
            .await;
        result
    }
}
