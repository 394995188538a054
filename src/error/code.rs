//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 服务发现相关错误
/// - 2000-2999: 负载均衡与重试相关错误
/// - 3000-3999: 熔断、限流相关错误
/// - 4000-4999: 上下文（超时、取消）相关错误
/// - 5000-5999: 传输相关错误
/// - 9000-9999: 业务错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 服务发现相关错误 (1000-1999)
    // ============================================================
    RegistryUnavailable = 1000,

    // ============================================================
    // 负载均衡与重试相关错误 (2000-2999)
    // ============================================================
    NoEndpoints = 2000,
    RetryExhausted = 2001,

    // ============================================================
    // 熔断、限流相关错误 (3000-3999)
    // ============================================================
    CircuitOpen = 3000,
    RateLimited = 3001,

    // ============================================================
    // 上下文相关错误 (4000-4999)
    // ============================================================
    DeadlineExceeded = 4000,
    Cancelled = 4001,

    // ============================================================
    // 传输相关错误 (5000-5999)
    // ============================================================
    TransportError = 5000,

    // ============================================================
    // 业务错误 (9000-9999)
    // ============================================================
    BusinessError = 9000,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::RegistryUnavailable),
            2000 => Some(ErrorCode::NoEndpoints),
            2001 => Some(ErrorCode::RetryExhausted),
            3000 => Some(ErrorCode::CircuitOpen),
            3001 => Some(ErrorCode::RateLimited),
            4000 => Some(ErrorCode::DeadlineExceeded),
            4001 => Some(ErrorCode::Cancelled),
            5000 => Some(ErrorCode::TransportError),
            9000 => Some(ErrorCode::BusinessError),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RegistryUnavailable => "REGISTRY_UNAVAILABLE",
            ErrorCode::NoEndpoints => "NO_ENDPOINTS",
            ErrorCode::RetryExhausted => "RETRY_EXHAUSTED",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::BusinessError => "BUSINESS_ERROR",
        }
    }

    /// 获取错误代码的类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Discovery,
            2000..=2999 => ErrorCategory::Balancing,
            3000..=3999 => ErrorCategory::Resilience,
            4000..=4999 => ErrorCategory::Context,
            5000..=5999 => ErrorCategory::Transport,
            _ => ErrorCategory::Business,
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 熔断打开只针对单个实例，换一个实例重试是有意义的。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::CircuitOpen
                | ErrorCode::RateLimited
                | ErrorCode::DeadlineExceeded
                | ErrorCode::TransportError
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Discovery,
    Balancing,
    Resilience,
    Context,
    Transport,
    Business,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Discovery => write!(f, "DISCOVERY"),
            ErrorCategory::Balancing => write!(f, "BALANCING"),
            ErrorCategory::Resilience => write!(f, "RESILIENCE"),
            ErrorCategory::Context => write!(f, "CONTEXT"),
            ErrorCategory::Transport => write!(f, "TRANSPORT"),
            ErrorCategory::Business => write!(f, "BUSINESS"),
        }
    }
}
