//! 服务实例定义

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 实例健康状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Passing,
    Warning,
    Critical,
    Maintenance,
}

impl HealthStatus {
    /// 聚合多个检查结果，取最差的状态
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses
            .into_iter()
            .max_by_key(|status| status.severity())
            .unwrap_or(HealthStatus::Passing)
    }

    fn severity(&self) -> u8 {
        match self {
            HealthStatus::Passing => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Critical => 2,
            HealthStatus::Maintenance => 3,
        }
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passing" => Ok(HealthStatus::Passing),
            "warning" => Ok(HealthStatus::Warning),
            "critical" => Ok(HealthStatus::Critical),
            "maintenance" => Ok(HealthStatus::Maintenance),
            _ => Err(format!("Unknown health status: {}", s)),
        }
    }
}

/// 服务实例
///
/// 实例只由注册中心产生，本库不会自行构造或持久化实例。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    /// 服务名称（如 "addsvc"）
    pub service_name: String,

    /// 实例 ID（唯一标识）
    pub instance_id: String,

    /// 节点地址
    pub node_address: String,

    /// 服务级地址（非空时优先于节点地址）
    pub service_address: Option<String>,

    /// 端口
    pub port: u16,

    /// 标签（如 "api"、"v2"）
    pub tags: Vec<String>,

    /// 元数据
    pub metadata: HashMap<String, String>,

    /// 健康状态
    pub health: HealthStatus,
}

impl ServiceInstance {
    /// 创建新的服务实例
    pub fn new(
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        node_address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: instance_id.into(),
            node_address: node_address.into(),
            service_address: None,
            port,
            tags: Vec::new(),
            metadata: HashMap::new(),
            health: HealthStatus::Passing,
        }
    }

    /// 设置服务级地址
    pub fn with_service_address(mut self, address: impl Into<String>) -> Self {
        self.service_address = Some(address.into());
        self
    }

    /// 添加标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// 批量添加标签
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 设置健康状态
    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = health;
        self
    }

    /// 是否通过健康检查
    pub fn is_passing(&self) -> bool {
        self.health == HealthStatus::Passing
    }

    /// 实际拨号使用的主机：服务级地址优先
    pub fn host(&self) -> &str {
        match self.service_address.as_deref() {
            Some(address) if !address.is_empty() => address,
            _ => &self.node_address,
        }
    }

    /// 拨号目标，格式为 `host:port`
    pub fn target(&self) -> String {
        let host = self.host();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// 是否包含全部指定标签（包含关系，而非相等）
    pub fn has_tags<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|tag| self.tags.iter().any(|own| own == tag.as_ref()))
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.service_name, self.instance_id, self.target())
    }
}
