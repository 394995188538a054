//! JSON over HTTP 客户端
//!
//! 把业务请求序列化为 JSON，POST 到 `http://{target}{path}`，
//! 再把响应体反序列化为业务响应。

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::context::Context;
use crate::discovery::{Factory, Made};
use crate::endpoint::{BoxEndpoint, Endpoint};
use crate::error::{EndpointError, Result};

/// JSON HTTP 客户端 Endpoint
pub struct JsonClient<Req, Resp> {
    http_client: reqwest::Client,
    url: String,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> JsonClient<Req, Resp> {
    pub fn new(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            _marker: PhantomData,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for JsonClient<Req, Resp>
where
    Req: Serialize + Send + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    async fn call(&self, ctx: Context, req: Req) -> Result<Resp> {
        let mut request = self.http_client.post(&self.url).json(&req);
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let resp = ctx
            .run(async {
                request
                    .send()
                    .await
                    .map_err(|e| EndpointError::transport(format!("request failed: {}", e)))
            })
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(url = %self.url, status = %status, "non-success response");
            return Err(EndpointError::transport(format!(
                "unexpected status {}: {}",
                status, body
            )));
        }

        ctx.run(async {
            resp.json::<Resp>()
                .await
                .map_err(|e| EndpointError::transport(format!("invalid response body: {}", e)))
        })
        .await
    }
}

/// 为每个实例构建 [`JsonClient`] 的工厂
pub struct JsonFactory<Req, Resp> {
    http_client: reqwest::Client,
    scheme: String,
    path: String,
    _marker: PhantomData<fn(Req) -> Resp>,
}

/// 构建 JSON HTTP 工厂，所有实例共享同一个连接池
pub fn json_factory<Req, Resp>(path: impl Into<String>) -> JsonFactory<Req, Resp> {
    JsonFactory {
        http_client: reqwest::Client::new(),
        scheme: "http".to_string(),
        path: path.into(),
        _marker: PhantomData,
    }
}

impl<Req, Resp> JsonFactory<Req, Resp> {
    pub fn with_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    fn url_for(&self, target: &str) -> String {
        format!("{}://{}{}", self.scheme, target, self.path)
    }
}

impl<Req, Resp> Factory<Req, Resp> for JsonFactory<Req, Resp>
where
    Req: Serialize + Send + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    fn make(&self, target: &str) -> Result<Made<Req, Resp>> {
        let url = self.url_for(target);
        reqwest::Url::parse(&url)
            .map_err(|e| EndpointError::transport(format!("invalid url {}: {}", url, e)))?;
        let endpoint: BoxEndpoint<Req, Resp> =
            Arc::new(JsonClient::new(self.http_client.clone(), url));
        Ok((endpoint, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_url_from_target() {
        let factory = json_factory::<u32, u32>("/sum");
        assert_eq!(factory.url_for("10.0.0.1:8080"), "http://10.0.0.1:8080/sum");

        let factory = json_factory::<u32, u32>("/sum").with_scheme("https");
        assert_eq!(factory.url_for("[::1]:8443"), "https://[::1]:8443/sum");
    }

    #[test]
    fn test_factory_rejects_invalid_target() {
        let factory = json_factory::<u32, u32>("/sum");
        assert!(factory.make("bad host:80").is_err());
        assert!(factory.make("10.0.0.1:8080").is_ok());
    }
}
