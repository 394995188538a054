//! Endpoint 统一错误类型
//!
//! 基础设施错误（无可用实例、熔断、限流、重试耗尽等）与业务错误严格区分：
//! 业务错误原样透传，调用方可以通过 `downcast_business` 取回原始错误。

use super::code::ErrorCode;
use std::sync::Arc;
use thiserror::Error;

/// 业务错误的共享表示
pub type BusinessError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Endpoint 调用错误
#[derive(Error, Debug, Clone)]
pub enum EndpointError {
    /// 当前实例集合为空
    #[error("no endpoints available")]
    NoEndpoints,

    /// 注册中心不可用（首次拉取失败，或尚未产生过快照）
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// 重试预算耗尽
    #[error("retry exhausted after {attempts} attempt(s): {last}")]
    RetryExhausted {
        /// 实际发起的调用次数
        attempts: usize,
        /// 最后一次尝试的底层错误
        last: Box<EndpointError>,
        /// 按时间顺序记录的全部错误
        errors: Vec<EndpointError>,
    },

    /// 熔断器拒绝调用
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// 限流器拒绝调用
    #[error("rate limit exceeded")]
    RateLimited,

    /// 上下文超时
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// 上下文被取消
    #[error("context cancelled")]
    Cancelled,

    /// 传输层错误（编解码失败、连接失败等）
    #[error("transport error: {0}")]
    Transport(String),

    /// 业务错误，原样透传
    #[error("{0}")]
    Business(BusinessError),
}

impl EndpointError {
    /// 包装业务错误
    pub fn business<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EndpointError::Business(Arc::new(error))
    }

    /// 创建传输错误
    pub fn transport(msg: impl Into<String>) -> Self {
        EndpointError::Transport(msg.into())
    }

    /// 创建注册中心不可用错误
    pub fn registry_unavailable(msg: impl Into<String>) -> Self {
        EndpointError::RegistryUnavailable(msg.into())
    }

    /// 构建重试耗尽错误
    ///
    /// `last` 是最后一次尝试的错误；没有发起任何尝试时是停止的原因。
    pub fn retry_exhausted(attempts: usize, last: EndpointError, errors: Vec<EndpointError>) -> Self {
        EndpointError::RetryExhausted {
            attempts,
            last: Box::new(last),
            errors,
        }
    }

    // ============================================================
    // 信息获取方法
    // ============================================================

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            EndpointError::NoEndpoints => ErrorCode::NoEndpoints,
            EndpointError::RegistryUnavailable(_) => ErrorCode::RegistryUnavailable,
            EndpointError::RetryExhausted { .. } => ErrorCode::RetryExhausted,
            EndpointError::CircuitOpen => ErrorCode::CircuitOpen,
            EndpointError::RateLimited => ErrorCode::RateLimited,
            EndpointError::DeadlineExceeded => ErrorCode::DeadlineExceeded,
            EndpointError::Cancelled => ErrorCode::Cancelled,
            EndpointError::Transport(_) => ErrorCode::TransportError,
            EndpointError::Business(_) => ErrorCode::BusinessError,
        }
    }

    /// 是否为基础设施错误（非业务错误）
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, EndpointError::Business(_))
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// 是否为上下文结束（超时或取消）导致的错误
    pub fn is_context_done(&self) -> bool {
        matches!(
            self,
            EndpointError::DeadlineExceeded | EndpointError::Cancelled
        )
    }

    /// 获取业务错误
    pub fn as_business(&self) -> Option<&BusinessError> {
        match self {
            EndpointError::Business(err) => Some(err),
            _ => None,
        }
    }

    /// 将业务错误还原为具体类型
    pub fn downcast_business<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.as_business().and_then(|err| err.downcast_ref::<E>())
    }

    /// 获取最终的底层错误
    ///
    /// 对 `RetryExhausted` 返回最后一次失败的错误，其余错误返回自身。
    pub fn last_error(&self) -> &EndpointError {
        match self {
            EndpointError::RetryExhausted { last, .. } => last.last_error(),
            other => other,
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, EndpointError>;
