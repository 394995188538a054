//! 熔断器
//!
//! 状态机：`closed -> open -> half_open -> closed`。
//! - closed：连续失败达到 `failure_threshold` 后熔断
//! - open：直接拒绝，`cool_down` 之后进入半开
//! - half_open：最多放行 `half_open_max_calls` 个试探调用，
//!   任一失败重新熔断，累计 `success_threshold` 次成功后闭合
//!
//! 每次状态切换进入新的一代，上一代放行的调用迟到的结果被丢弃。

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Breaker, CircuitState, Outcome, Ticket};
use crate::error::{EndpointError, Result};

/// 熔断器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// 触发熔断的连续失败次数
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// 熔断后的冷却时间（毫秒）
    #[serde(default = "default_cool_down_ms")]
    pub cool_down_ms: u64,

    /// 半开状态下允许同时进行的试探调用数
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,

    /// 半开状态下闭合所需的成功次数
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cool_down_ms() -> u64 {
    30_000
}

fn default_half_open_max_calls() -> u32 {
    1
}

fn default_success_threshold() -> u32 {
    1
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cool_down_ms: default_cool_down_ms(),
            half_open_max_calls: default_half_open_max_calls(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, cool_down: Duration) -> Self {
        Self {
            failure_threshold,
            cool_down_ms: cool_down.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls;
        self
    }

    pub fn with_success_threshold(mut self, successes: u32) -> Self {
        self.success_threshold = successes;
        self
    }

    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

impl Inner {
    fn transition(&mut self, name: &str, new_state: CircuitState) {
        let old_state = self.state;
        self.state = new_state;
        self.generation = self.generation.wrapping_add(1);
        self.half_open_in_flight = 0;
        self.half_open_successes = 0;
        match new_state {
            CircuitState::Open => {
                self.opened_at = Some(Instant::now());
                warn!(
                    breaker = %name,
                    from = %old_state,
                    failures = self.consecutive_failures,
                    "circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                self.opened_at = None;
                info!(breaker = %name, "circuit breaker half-open");
            }
            CircuitState::Closed => {
                self.opened_at = None;
                self.consecutive_failures = 0;
                info!(breaker = %name, "circuit breaker closed");
            }
        }
    }

    fn cool_down_elapsed(&self, cool_down: Duration) -> bool {
        self.opened_at
            .map(|opened_at| opened_at.elapsed() >= cool_down)
            .unwrap_or(true)
    }
}

/// 连续失败计数的熔断器
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                consecutive_failures: 0,
                opened_at: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// 当前连续失败次数
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Breaker for CircuitBreaker {
    fn acquire(&self) -> Result<Ticket> {
        let mut inner = self.lock();

        if inner.state == CircuitState::Open {
            if !inner.cool_down_elapsed(self.config.cool_down()) {
                return Err(EndpointError::CircuitOpen);
            }
            inner.transition(&self.name, CircuitState::HalfOpen);
        }

        let ticket = Ticket::new(inner.generation);
        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(ticket),
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_calls.max(1) {
                    inner.half_open_in_flight += 1;
                    Ok(ticket)
                } else {
                    Err(EndpointError::CircuitOpen)
                }
            }
            CircuitState::Open => Err(EndpointError::CircuitOpen),
        }
    }

    fn record(&self, ticket: Ticket, outcome: Outcome) {
        let mut inner = self.lock();
        if ticket.generation() != inner.generation {
            debug!(
                breaker = %self.name,
                ?outcome,
                "dropping outcome from a previous breaker generation"
            );
            return;
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => match outcome {
                Outcome::Success => inner.consecutive_failures = 0,
                Outcome::Failure => {
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.config.failure_threshold.max(1) {
                        inner.transition(&self.name, CircuitState::Open);
                    }
                }
                Outcome::Ignored => {}
            },
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                match outcome {
                    Outcome::Success => {
                        inner.half_open_successes += 1;
                        if inner.half_open_successes >= self.config.success_threshold.max(1) {
                            inner.transition(&self.name, CircuitState::Closed);
                        }
                    }
                    Outcome::Failure => {
                        inner.consecutive_failures += 1;
                        inner.transition(&self.name, CircuitState::Open);
                    }
                    Outcome::Ignored => {}
                }
            }
            // open 状态不签发许可
            CircuitState::Open => {}
        }
    }

    fn state(&self) -> CircuitState {
        let inner = self.lock();
        if inner.state == CircuitState::Open && inner.cool_down_elapsed(self.config.cool_down()) {
            CircuitState::HalfOpen
        } else {
            inner.state
        }
    }
}
