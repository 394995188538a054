//! Endpoint 中间件
//!
//! 提供日志、指标、超时、限流、熔断等中间件。所有中间件都实现
//! [`Middleware`](crate::endpoint::Middleware)，可以用
//! [`compose`](crate::endpoint::compose) 组合。组合顺序需要在调用处写明，
//! 例如日志放在限流外层时，记录的耗时包含限流等待。

pub mod circuit_breaker;
pub mod instrumenting;
pub mod logging;
pub mod rate_limit;
pub mod timeout;

pub use circuit_breaker::CircuitBreakerMiddleware;
pub use instrumenting::InstrumentingMiddleware;
pub use logging::LoggingMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use timeout::TimeoutMiddleware;
