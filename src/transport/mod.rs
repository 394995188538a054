//! 传输层适配
//!
//! 线路协议只是 Endpoint 的外壳：
//! - 服务端：把线路请求解码为业务请求，调用 Endpoint，再把响应或错误编码回线路格式
//! - 客户端：把业务请求编码后交给 [`RoundTrip`] 发送，再解码响应，整体作为一个 Endpoint
//!
//! 本模块不规定任何具体的序列化格式。

#[cfg(feature = "http")]
pub mod http;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::endpoint::{BoxEndpoint, Endpoint};
use crate::error::{EndpointError, Result};

type DecodeFn<In, Out> = Arc<dyn Fn(In) -> Result<Out> + Send + Sync>;
type BeforeFn<WireReq> = Arc<dyn Fn(Context, &WireReq) -> Context + Send + Sync>;

/// 服务端适配器
pub struct Server<WireReq, WireResp, Req, Resp> {
    endpoint: BoxEndpoint<Req, Resp>,
    decode: DecodeFn<WireReq, Req>,
    encode: DecodeFn<Resp, WireResp>,
    error_encoder: Arc<dyn Fn(&EndpointError) -> WireResp + Send + Sync>,
    before: Vec<BeforeFn<WireReq>>,
}

impl<WireReq, WireResp, Req, Resp> Server<WireReq, WireResp, Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new<D, E, X>(endpoint: BoxEndpoint<Req, Resp>, decode: D, encode: E, error_encoder: X) -> Self
    where
        D: Fn(WireReq) -> Result<Req> + Send + Sync + 'static,
        E: Fn(Resp) -> Result<WireResp> + Send + Sync + 'static,
        X: Fn(&EndpointError) -> WireResp + Send + Sync + 'static,
    {
        Self {
            endpoint,
            decode: Arc::new(decode),
            encode: Arc::new(encode),
            error_encoder: Arc::new(error_encoder),
            before: Vec::new(),
        }
    }

    /// 在解码前根据线路请求调整上下文（如读取截止时间、请求 ID）
    pub fn with_before<F>(mut self, before: F) -> Self
    where
        F: Fn(Context, &WireReq) -> Context + Send + Sync + 'static,
    {
        self.before.push(Arc::new(before));
        self
    }

    /// 处理一次线路请求
    ///
    /// 任何错误都交给错误编码器转换为线路响应。
    pub async fn serve(&self, ctx: Context, wire: WireReq) -> WireResp {
        let ctx = self
            .before
            .iter()
            .fold(ctx, |ctx, before| before(ctx, &wire));

        let result = match (self.decode)(wire) {
            Ok(req) => self
                .endpoint
                .call(ctx, req)
                .await
                .and_then(|resp| (self.encode)(resp)),
            Err(err) => Err(err),
        };

        result.unwrap_or_else(|err| {
            debug!(error = %err, "encoding error response");
            (self.error_encoder)(&err)
        })
    }
}

/// 客户端传输：发送一个线路请求并返回线路响应
#[async_trait]
pub trait RoundTrip<WireReq, WireResp>: Send + Sync {
    async fn round_trip(&self, ctx: &Context, req: WireReq) -> Result<WireResp>;
}

/// 客户端适配器
///
/// 本身就是一个 Endpoint，可以交给订阅者的工厂、负载均衡器和重试使用。
pub struct Client<WireReq, WireResp, Req, Resp> {
    transport: Arc<dyn RoundTrip<WireReq, WireResp>>,
    encode: DecodeFn<Req, WireReq>,
    decode: DecodeFn<WireResp, Resp>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<WireReq, WireResp, Req, Resp> Client<WireReq, WireResp, Req, Resp> {
    pub fn new<T, E, D>(transport: T, encode: E, decode: D) -> Self
    where
        T: RoundTrip<WireReq, WireResp> + 'static,
        E: Fn(Req) -> Result<WireReq> + Send + Sync + 'static,
        D: Fn(WireResp) -> Result<Resp> + Send + Sync + 'static,
    {
        Self {
            transport: Arc::new(transport),
            encode: Arc::new(encode),
            decode: Arc::new(decode),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<WireReq, WireResp, Req, Resp> Endpoint<Req, Resp> for Client<WireReq, WireResp, Req, Resp>
where
    WireReq: Send + 'static,
    WireResp: Send + 'static,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        let wire = (self.encode)(req)?;
        let wire_resp = ctx.run(self.transport.round_trip(&ctx, wire)).await?;
        (self.decode)(wire_resp)
    }
}
