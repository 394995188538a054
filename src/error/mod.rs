//! 错误处理模块
//!
//! 提供统一的 Endpoint 错误类型与错误代码分类

pub mod code;
pub mod endpoint_error;

pub use code::{ErrorCategory, ErrorCode};
pub use endpoint_error::{BusinessError, EndpointError, Result};
