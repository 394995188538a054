//! Endpoint 工厂
//!
//! 订阅者通过工厂把实例的拨号目标（`host:port`）转换为 Endpoint。

use crate::endpoint::{BoxEndpoint, BoxMiddleware, Middleware};
use crate::error::Result;

/// 释放 Endpoint 关联资源（连接池、后台任务等）
pub trait Closer: Send + Sync {
    fn close(&self);
}

impl<F> Closer for F
where
    F: Fn() + Send + Sync,
{
    fn close(&self) {
        self()
    }
}

/// 工厂产出：Endpoint 以及可选的关闭器
pub type Made<Req, Resp> = (BoxEndpoint<Req, Resp>, Option<Box<dyn Closer>>);

/// Endpoint 工厂 trait
pub trait Factory<Req, Resp>: Send + Sync {
    /// 为拨号目标构建 Endpoint
    ///
    /// 构建失败时订阅者会跳过该实例并记录日志。
    fn make(&self, target: &str) -> Result<Made<Req, Resp>>;
}

/// 由闭包构建的工厂
pub struct FactoryFn<F>(F);

/// 将闭包适配为工厂
pub fn factory_fn<Req, Resp, F>(f: F) -> FactoryFn<F>
where
    F: Fn(&str) -> Result<Made<Req, Resp>> + Send + Sync,
{
    FactoryFn(f)
}

impl<Req, Resp, F> Factory<Req, Resp> for FactoryFn<F>
where
    F: Fn(&str) -> Result<Made<Req, Resp>> + Send + Sync,
{
    fn make(&self, target: &str) -> Result<Made<Req, Resp>> {
        (self.0)(target)
    }
}

/// 为每个目标单独套上中间件的工厂
pub struct Layered<F, M> {
    inner: F,
    layer: M,
}

/// 用 `layer(target)` 产出的中间件包装工厂构建的每个 Endpoint
///
/// 典型用法是为每个实例单独挂一个熔断器，使某个实例熔断时
/// 重试仍然可以选择其他实例。
pub fn layered<Req, Resp, F, M>(inner: F, layer: M) -> Layered<F, M>
where
    F: Factory<Req, Resp>,
    M: Fn(&str) -> BoxMiddleware<Req, Resp> + Send + Sync,
{
    Layered { inner, layer }
}

impl<Req, Resp, F, M> Factory<Req, Resp> for Layered<F, M>
where
    F: Factory<Req, Resp>,
    M: Fn(&str) -> BoxMiddleware<Req, Resp> + Send + Sync,
{
    fn make(&self, target: &str) -> Result<Made<Req, Resp>> {
        let (endpoint, closer) = self.inner.make(target)?;
        Ok(((self.layer)(target).wrap(endpoint), closer))
    }
}
