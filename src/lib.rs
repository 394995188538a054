//! Flare Endpoint
//!
//! 与线路协议无关的调用抽象和客户端弹性层：
//! - `endpoint`：统一的 Endpoint 契约与中间件组合
//! - `discovery`：注册中心订阅者，维护实时的实例视图
//! - `balancer`：从实例视图中选择一个 Endpoint
//! - `retry`：把负载均衡器变成带总时长预算的重试 Endpoint
//! - `middleware` / `resilience`：日志、指标、超时、限流、熔断
//!
//! 数据流：注册中心 → 订阅者 → 负载均衡器 → 重试 → Endpoint，
//! 中间件可以包在任意一层。

pub mod balancer;
pub mod config;
pub mod context;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod resilience;
pub mod retry;
pub mod transport;

// Re-exports
pub use balancer::{Balancer, Random, RoundRobin, Strategy};
pub use config::{BalancerConfig, Config, RetryConfig};
pub use context::{Context, RequestId};
pub use discovery::{
    factory_fn, layered, Closer, ErrorPolicy, Factory, FixedSubscriber, HealthStatus,
    MemoryRegistry, RegistryClient, RegistrySubscriber, ServiceInstance, Subscriber,
    SubscriberConfig,
};
pub use endpoint::{
    boxed, chain, compose, endpoint_fn, middleware_fn, BoxEndpoint, BoxMiddleware, Endpoint,
    EndpointService, Middleware,
};
pub use error::{ErrorCategory, ErrorCode, EndpointError, Result};
pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use metrics::{MetricsCollector, MetricsSink, NopSink};
pub use middleware::{
    CircuitBreakerMiddleware, InstrumentingMiddleware, LoggingMiddleware, RateLimitMiddleware,
    TimeoutMiddleware,
};
pub use resilience::{
    Breaker, CircuitBreaker, CircuitBreakerConfig, CircuitState, Limiter, Outcome,
    RateLimitConfig, RateLimitMode, Ticket, TokenBucket,
};
pub use retry::{retry, AlwaysRetry, ExponentialBackoffPolicy, FixedRetryPolicy, Retry, RetryPolicy};
