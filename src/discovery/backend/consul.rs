//! Consul 注册中心后端

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{QueryMeta, QueryOptions, RegistryClient, RegistryError};
use crate::discovery::instance::{HealthStatus, ServiceInstance};

/// Consul 健康查询返回的条目
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    node: Node,
    service: AgentService,
    #[serde(default)]
    checks: Vec<HealthCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Node {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    #[serde(rename = "ID")]
    id: String,
    service: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    meta: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthCheck {
    status: String,
}

impl From<ServiceEntry> for ServiceInstance {
    fn from(entry: ServiceEntry) -> Self {
        let health = HealthStatus::aggregate(
            entry
                .checks
                .iter()
                .map(|check| check.status.parse().unwrap_or(HealthStatus::Critical)),
        );
        let mut instance = ServiceInstance::new(
            entry.service.service,
            entry.service.id,
            entry.node.address,
            entry.service.port,
        )
        .with_tags(entry.service.tags.unwrap_or_default())
        .with_health(health);
        if !entry.service.address.is_empty() {
            instance = instance.with_service_address(entry.service.address);
        }
        instance.metadata = entry.service.meta.unwrap_or_default();
        instance
    }
}

/// Consul 注册中心后端
pub struct ConsulRegistry {
    http_client: HttpClient,
    consul_url: String,
}

impl ConsulRegistry {
    /// 创建新的 Consul 后端
    ///
    /// # 参数
    /// * `consul_url` - Consul agent 地址，如 `http://localhost:8500`
    pub fn new(consul_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            consul_url: consul_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 使用自定义 HTTP 客户端创建
    pub fn with_client(consul_url: impl Into<String>, http_client: HttpClient) -> Self {
        Self {
            http_client,
            consul_url: consul_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn unreachable(err: reqwest::Error) -> RegistryError {
    RegistryError::Unreachable(err.to_string())
}

fn format_wait(wait: Duration) -> String {
    format!("{}ms", wait.as_millis())
}

#[async_trait]
impl RegistryClient for ConsulRegistry {
    async fn service(
        &self,
        service: &str,
        options: &QueryOptions,
    ) -> Result<(Vec<ServiceInstance>, QueryMeta), RegistryError> {
        let url = format!("{}/v1/health/service/{}", self.consul_url, service);

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(tag) = &options.tag {
            query.push(("tag", tag.clone()));
        }
        if options.passing_only {
            query.push(("passing", "true".to_string()));
        }
        if options.wait_index > 0 {
            query.push(("index", options.wait_index.to_string()));
            if let Some(wait) = options.wait_time {
                query.push(("wait", format_wait(wait)));
            }
        }

        let resp = self
            .http_client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(unreachable)?;

        if !resp.status().is_success() {
            return Err(RegistryError::Unreachable(format!(
                "consul responded with status {}",
                resp.status()
            )));
        }

        let last_index = resp
            .headers()
            .get("X-Consul-Index")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let entries: Vec<ServiceEntry> = resp
            .json()
            .await
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        let instances = entries.into_iter().map(ServiceInstance::from).collect();
        Ok((instances, QueryMeta { last_index }))
    }

    async fn register(&self, instance: ServiceInstance) -> Result<(), RegistryError> {
        let url = format!("{}/v1/agent/service/register", self.consul_url);

        let payload = serde_json::json!({
            "ID": instance.instance_id,
            "Name": instance.service_name,
            "Tags": instance.tags,
            "Address": instance.host(),
            "Port": instance.port,
            "Meta": instance.metadata,
        });

        let resp = self
            .http_client
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(unreachable)?;

        if !resp.status().is_success() {
            return Err(RegistryError::Unreachable(format!(
                "consul register failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn deregister(&self, instance_id: &str) -> Result<(), RegistryError> {
        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.consul_url, instance_id
        );
        let resp = self
            .http_client
            .put(&url)
            .send()
            .await
            .map_err(unreachable)?;

        if !resp.status().is_success() {
            return Err(RegistryError::NotFound(instance_id.to_string()));
        }
        Ok(())
    }
}
