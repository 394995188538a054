//! Endpoint 抽象
//!
//! Endpoint 是调用的最小单元：`(context, request) -> Result<response>`。
//! 业务服务、负载均衡器、重试组合器和中间件都产出 Endpoint，
//! 线路协议（HTTP、gRPC 等）只是把 Endpoint 暴露出去的适配器。

pub mod middleware;
pub mod service;

pub use middleware::{chain, compose, middleware_fn, BoxMiddleware, Middleware, MiddlewareFn};
pub use service::EndpointService;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Result;

/// Endpoint trait
///
/// 注意：由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait Endpoint<Req, Resp>: Send + Sync {
    /// 调用 Endpoint
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp>;
}

/// 类型擦除后的 Endpoint
pub type BoxEndpoint<Req, Resp> = Arc<dyn Endpoint<Req, Resp>>;

#[async_trait]
impl<Req, Resp, E> Endpoint<Req, Resp> for Arc<E>
where
    E: Endpoint<Req, Resp> + ?Sized,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        (**self).call(ctx, req).await
    }
}

/// 擦除具体类型
pub fn boxed<Req, Resp, E>(endpoint: E) -> BoxEndpoint<Req, Resp>
where
    E: Endpoint<Req, Resp> + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    Arc::new(endpoint)
}

/// 由异步闭包构建的 Endpoint
pub struct EndpointFn<F, Req, Resp> {
    f: F,
    _marker: PhantomData<fn(Req) -> Resp>,
}

/// 将异步闭包适配为 Endpoint
///
/// ```rust
/// use flare_endpoint::endpoint::{endpoint_fn, Endpoint};
/// use flare_endpoint::Context;
///
/// # async fn example() -> flare_endpoint::Result<()> {
/// let upper = endpoint_fn(|_ctx: Context, s: String| async move { Ok(s.to_uppercase()) });
/// assert_eq!(upper.call(Context::background(), "a".to_string()).await?, "A");
/// # Ok(())
/// # }
/// ```
pub fn endpoint_fn<Req, Resp, F, Fut>(f: F) -> EndpointFn<F, Req, Resp>
where
    F: Fn(Context, Req) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp>> + Send,
{
    EndpointFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<Req, Resp, F, Fut> Endpoint<Req, Resp> for EndpointFn<F, Req, Resp>
where
    F: Fn(Context, Req) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp>> + Send,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        (self.f)(ctx, req).await
    }
}
