//! 服务发现模块
//!
//! 注册中心客户端（Consul、内存）产出服务实例，订阅者持续监听实例变化，
//! 通过工厂把实例转换为 Endpoint，并以原子替换的快照形式交给负载均衡器。

pub mod backend;
pub mod cache;
pub mod config;
pub mod factory;
pub mod instance;
pub mod subscriber;

#[cfg(feature = "consul")]
pub use backend::ConsulRegistry;
pub use backend::{MemoryRegistry, QueryMeta, QueryOptions, RegistryClient, RegistryError};
pub use cache::{EndpointCache, EndpointSet};
pub use config::{ErrorPolicy, SubscriberConfig};
pub use factory::{factory_fn, layered, Closer, Factory, FactoryFn, Layered, Made};
pub use instance::{HealthStatus, ServiceInstance};
pub use subscriber::{FixedSubscriber, RegistrySubscriber, Subscriber};
