use std::marker::PhantomData;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Balancer;
use crate::discovery::Subscriber;
use crate::endpoint::BoxEndpoint;
use crate::error::{EndpointError, Result};

/// 随机负载均衡器
///
/// 每个实例持有自己的随机数生成器，不共享进程级随机源。
pub struct Random<S, Req, Resp> {
    subscriber: S,
    rng: Mutex<StdRng>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<S, Req, Resp> Random<S, Req, Resp>
where
    S: Subscriber<Req, Resp>,
{
    /// 使用固定种子创建（结果可复现）
    pub fn new(subscriber: S, seed: u64) -> Self {
        Self::with_rng(subscriber, StdRng::seed_from_u64(seed))
    }

    /// 使用系统熵源创建
    pub fn from_entropy(subscriber: S) -> Self {
        Self::with_rng(subscriber, StdRng::from_entropy())
    }

    fn with_rng(subscriber: S, rng: StdRng) -> Self {
        Self {
            subscriber,
            rng: Mutex::new(rng),
            _marker: PhantomData,
        }
    }
}

impl<S, Req, Resp> Balancer<Req, Resp> for Random<S, Req, Resp>
where
    S: Subscriber<Req, Resp>,
{
    fn endpoint(&self) -> Result<BoxEndpoint<Req, Resp>> {
        let endpoints = self.subscriber.endpoints()?;
        if endpoints.is_empty() {
            return Err(EndpointError::NoEndpoints);
        }
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(0..endpoints.len())
        };
        Ok(endpoints[index].clone())
    }
}
