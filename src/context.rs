//! 调用上下文
//!
//! `Context` 承载一次调用的截止时间、取消信号以及请求级别的值。
//! 它是唯一的取消机制：所有 Endpoint 调用都应通过 [`Context::run`]
//! 或 [`Context::sleep`] 在有界时间内结束。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{EndpointError, Result};

/// 调用上下文
///
/// 克隆开销很小；派生出的新上下文不会修改调用方持有的上下文。
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
    values: Arc<http::Extensions>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// 创建一个没有截止时间的根上下文
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
            values: Arc::new(http::Extensions::new()),
        }
    }

    /// 设置截止时间（只会收紧，不会放宽）
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        });
        self
    }

    /// 设置相对超时时间
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// 派生子上下文
    ///
    /// 取消父上下文会同时取消子上下文，反之不然。
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
            values: self.values.clone(),
        }
    }

    /// 附加请求级别的值（写时复制）
    #[must_use]
    pub fn with_value<T>(mut self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.values).insert(value);
        self
    }

    /// 读取请求级别的值
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get::<T>()
    }

    /// 截止时间
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 剩余时间；没有截止时间时返回 `None`
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// 是否已超过截止时间
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// 是否已被取消
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 上下文结束时对应的错误；未结束返回 `None`
    pub fn done_error(&self) -> Option<EndpointError> {
        if self.is_cancelled() {
            Some(EndpointError::Cancelled)
        } else if self.is_expired() {
            Some(EndpointError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// 取消该上下文及其所有子上下文
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// 底层取消令牌
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// 在截止时间和取消信号的约束下执行 future
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if let Some(err) = self.done_error() {
            return Err(err);
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(EndpointError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => Err(EndpointError::DeadlineExceeded),
                    res = fut => res,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(EndpointError::Cancelled),
                    res = fut => res,
                }
            }
        }
    }

    /// 睡眠指定时长，除非上下文先结束
    ///
    /// 如果睡眠会越过截止时间，立即返回 `DeadlineExceeded`。
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if let Some(err) = self.done_error() {
            return Err(err);
        }
        if self.remaining().is_some_and(|remaining| remaining < duration) {
            return Err(EndpointError::DeadlineExceeded);
        }
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

/// 请求 ID（请求级别的值）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// 生成新的请求 ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
