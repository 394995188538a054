use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::{Context, RequestId};
use crate::endpoint::{BoxEndpoint, Endpoint, Middleware};
use crate::error::Result;

/// 日志中间件
///
/// 每次调用结束后记录方法名、耗时、请求 ID 以及错误。
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    method: Arc<str>,
}

impl LoggingMiddleware {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: Arc::from(method.into()),
        }
    }
}

impl<Req, Resp> Middleware<Req, Resp> for LoggingMiddleware
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        Arc::new(Logging {
            next,
            method: self.method.clone(),
        })
    }
}

struct Logging<Req, Resp> {
    next: BoxEndpoint<Req, Resp>,
    method: Arc<str>,
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for Logging<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        let request_id = ctx
            .value::<RequestId>()
            .map(|id| id.to_string())
            .unwrap_or_default();
        let start = Instant::now();

        let result = self.next.call(ctx, req).await;
        let took_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(
                method = %self.method,
                request_id = %request_id,
                took_ms,
                "call completed"
            ),
            Err(err) => warn!(
                method = %self.method,
                request_id = %request_id,
                took_ms,
                error = %err,
                code = %err.code(),
                "call failed"
            ),
        }

        result
    }
}
