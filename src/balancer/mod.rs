//! 负载均衡模块
//!
//! 负载均衡器每次从订阅者的当前快照中选出一个 Endpoint，
//! 通常由重试组合器在每次尝试时调用一次。

pub mod random;
pub mod round_robin;

pub use random::Random;
pub use round_robin::RoundRobin;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::discovery::Subscriber;
use crate::endpoint::BoxEndpoint;
use crate::error::Result;

/// 负载均衡器 trait
pub trait Balancer<Req, Resp>: Send + Sync {
    /// 选择一个 Endpoint
    ///
    /// 订阅者出错时透传错误；当前集合为空时返回 `NoEndpoints`。
    fn endpoint(&self) -> Result<BoxEndpoint<Req, Resp>>;
}

impl<Req, Resp, B> Balancer<Req, Resp> for Arc<B>
where
    B: Balancer<Req, Resp> + ?Sized,
{
    fn endpoint(&self) -> Result<BoxEndpoint<Req, Resp>> {
        (**self).endpoint()
    }
}

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 轮询（Round Robin）
    #[default]
    RoundRobin,
    /// 随机（Random）
    Random,
}

impl Strategy {
    /// 根据策略构建负载均衡器
    ///
    /// `seed` 只对随机策略生效；为 `None` 时使用系统熵源。
    pub fn build<Req, Resp, S>(self, subscriber: S, seed: Option<u64>) -> Arc<dyn Balancer<Req, Resp>>
    where
        S: Subscriber<Req, Resp> + 'static,
        Req: 'static,
        Resp: 'static,
    {
        match self {
            Strategy::RoundRobin => Arc::new(RoundRobin::new(subscriber)),
            Strategy::Random => match seed {
                Some(seed) => Arc::new(Random::new(subscriber, seed)),
                None => Arc::new(Random::from_entropy(subscriber)),
            },
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "round_robin" | "roundrobin" | "rr" => Ok(Strategy::RoundRobin),
            "random" => Ok(Strategy::Random),
            _ => Err(format!("Unknown balancer strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::RoundRobin => write!(f, "round_robin"),
            Strategy::Random => write!(f, "random"),
        }
    }
}
