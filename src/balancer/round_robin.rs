use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Balancer;
use crate::discovery::Subscriber;
use crate::endpoint::BoxEndpoint;
use crate::error::{EndpointError, Result};

/// 轮询负载均衡器
///
/// 计数器单调递增，每次调用按当次看到的集合大小取模，
/// 因此即使集合在两次调用之间缩小，下标也始终有效。
pub struct RoundRobin<S, Req, Resp> {
    subscriber: S,
    counter: AtomicUsize,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<S, Req, Resp> RoundRobin<S, Req, Resp>
where
    S: Subscriber<Req, Resp>,
{
    pub fn new(subscriber: S) -> Self {
        Self {
            subscriber,
            counter: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }
}

impl<S, Req, Resp> Balancer<Req, Resp> for RoundRobin<S, Req, Resp>
where
    S: Subscriber<Req, Resp>,
{
    fn endpoint(&self) -> Result<BoxEndpoint<Req, Resp>> {
        let endpoints = self.subscriber.endpoints()?;
        if endpoints.is_empty() {
            return Err(EndpointError::NoEndpoints);
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(endpoints[index % endpoints.len()].clone())
    }
}
