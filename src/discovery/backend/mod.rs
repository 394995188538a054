//! 注册中心客户端抽象和实现

#[cfg(feature = "consul")]
pub mod consul;
pub mod memory;

#[cfg(feature = "consul")]
pub use consul::ConsulRegistry;
pub use memory::MemoryRegistry;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::discovery::instance::ServiceInstance;

/// 注册中心错误
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// 注册中心不可达
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// 响应格式错误
    #[error("invalid registry response: {0}")]
    InvalidResponse(String),

    /// 服务实例不存在
    #[error("instance not found: {0}")]
    NotFound(String),
}

/// 查询选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// 注册中心侧过滤的单个标签
    pub tag: Option<String>,

    /// 只返回健康实例
    pub passing_only: bool,

    /// 阻塞查询的索引：注册中心在索引超过该值之前挂起请求
    pub wait_index: u64,

    /// 阻塞查询的最长等待时间
    pub wait_time: Option<Duration>,
}

/// 查询元信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// 当前数据对应的变更索引，用于下一次阻塞查询
    pub last_index: u64,
}

/// 注册中心客户端 trait
///
/// 所有注册中心后端（Consul、内存等）都需要实现这个 trait
/// 注意：由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 查询服务实例
    ///
    /// 当 `options.wait_index` 非零时为阻塞查询：在数据索引超过
    /// `wait_index` 或等待超过 `wait_time` 之前不返回。
    async fn service(
        &self,
        service: &str,
        options: &QueryOptions,
    ) -> Result<(Vec<ServiceInstance>, QueryMeta), RegistryError>;

    /// 注册服务实例
    async fn register(&self, instance: ServiceInstance) -> Result<(), RegistryError>;

    /// 注销服务实例
    async fn deregister(&self, instance_id: &str) -> Result<(), RegistryError>;
}
