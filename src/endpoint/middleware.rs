//! 中间件组合
//!
//! 中间件是 `Endpoint -> Endpoint` 的变换。组合顺序决定嵌套关系：
//! `compose(&[m1, m2, m3], e)` 等价于 `m1(m2(m3(e)))`，即列表中第一个
//! 中间件位于最外层，请求进入时最先执行，响应返回时最后执行。
//! 例如日志中间件放在限流之外，记录的耗时就包含限流等待时间。

use std::marker::PhantomData;
use std::sync::Arc;

use super::BoxEndpoint;

/// 中间件 trait
pub trait Middleware<Req, Resp>: Send + Sync {
    /// 包装下一个 Endpoint，返回新的 Endpoint（不修改原 Endpoint）
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp>;
}

/// 类型擦除后的中间件
pub type BoxMiddleware<Req, Resp> = Arc<dyn Middleware<Req, Resp>>;

impl<Req, Resp, M> Middleware<Req, Resp> for Arc<M>
where
    M: Middleware<Req, Resp> + ?Sized,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        (**self).wrap(next)
    }
}

/// 由闭包构建的中间件
pub struct MiddlewareFn<F, Req, Resp> {
    f: F,
    _marker: PhantomData<fn(Req) -> Resp>,
}

/// 将闭包适配为中间件
pub fn middleware_fn<Req, Resp, F>(f: F) -> MiddlewareFn<F, Req, Resp>
where
    F: Fn(BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> + Send + Sync,
{
    MiddlewareFn {
        f,
        _marker: PhantomData,
    }
}

impl<Req, Resp, F> Middleware<Req, Resp> for MiddlewareFn<F, Req, Resp>
where
    F: Fn(BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> + Send + Sync,
{
    fn wrap(&self, next: BoxEndpoint<Req, Resp>) -> BoxEndpoint<Req, Resp> {
        (self.f)(next)
    }
}

/// 按从右到左的顺序把中间件应用到 `inner` 上
///
/// `middlewares[0]` 位于最外层。
pub fn compose<Req, Resp>(
    middlewares: &[BoxMiddleware<Req, Resp>],
    inner: BoxEndpoint<Req, Resp>,
) -> BoxEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    middlewares
        .iter()
        .rev()
        .fold(inner, |next, middleware| middleware.wrap(next))
}

/// 将 `outer` 与其余中间件串成一个中间件
///
/// `outer` 位于最外层，`others` 依次向内。
pub fn chain<Req, Resp>(
    outer: BoxMiddleware<Req, Resp>,
    others: Vec<BoxMiddleware<Req, Resp>>,
) -> BoxMiddleware<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let mut all = Vec::with_capacity(others.len() + 1);
    all.push(outer);
    all.extend(others);
    Arc::new(middleware_fn::<Req, Resp, _>(move |next| {
        compose(&all, next)
    }))
}
