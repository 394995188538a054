//! tower 集成
//!
//! 将 Endpoint 暴露为 `tower::Service<(Context, Req)>`，便于基于 tower
//! 构建的传输层（axum、tonic 等）直接驱动 Endpoint。

use std::task::{Context as TaskContext, Poll};

use futures::future::BoxFuture;
use tower::Service;

use super::{BoxEndpoint, Endpoint};
use crate::context::Context;
use crate::error::EndpointError;

/// Endpoint 的 tower 服务包装器
pub struct EndpointService<Req, Resp> {
    endpoint: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> EndpointService<Req, Resp> {
    pub fn new(endpoint: BoxEndpoint<Req, Resp>) -> Self {
        Self { endpoint }
    }

    /// 获取底层的 Endpoint
    pub fn endpoint(&self) -> &BoxEndpoint<Req, Resp> {
        &self.endpoint
    }
}

impl<Req, Resp> Clone for EndpointService<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<Req, Resp> Service<(Context, Req)> for EndpointService<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    type Response = Resp;
    type Error = EndpointError;
    type Future = BoxFuture<'static, Result<Resp, EndpointError>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        // Endpoint 本身无背压，随时可调用
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (ctx, req): (Context, Req)) -> Self::Future {
        let endpoint = self.endpoint.clone();
        Box::pin(async move { Endpoint::call(&*endpoint, ctx, req).await })
    }
}
