//! Endpoint 缓存
//!
//! 按拨号目标缓存 Endpoint：实例集合刷新时复用已有 Endpoint，
//! 只为新出现的目标调用工厂，并关闭已经消失的目标。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::factory::{Closer, Factory};
use super::instance::ServiceInstance;
use crate::endpoint::BoxEndpoint;

/// 当前可用的 Endpoint 快照
pub type EndpointSet<Req, Resp> = Arc<Vec<BoxEndpoint<Req, Resp>>>;

struct Entry<Req, Resp> {
    endpoint: BoxEndpoint<Req, Resp>,
    closer: Option<Box<dyn Closer>>,
}

impl<Req, Resp> Entry<Req, Resp> {
    fn close(&self) {
        if let Some(closer) = &self.closer {
            closer.close();
        }
    }
}

/// Endpoint 缓存
pub struct EndpointCache<Req, Resp> {
    factory: Arc<dyn Factory<Req, Resp>>,
    entries: HashMap<String, Entry<Req, Resp>>,
}

impl<Req, Resp> EndpointCache<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    pub fn new(factory: Arc<dyn Factory<Req, Resp>>) -> Self {
        Self {
            factory,
            entries: HashMap::new(),
        }
    }

    /// 根据最新的实例列表更新缓存，返回与实例顺序一致的 Endpoint 集合
    ///
    /// 同一目标只产生一个 Endpoint；工厂失败的实例被跳过。
    pub fn update(&mut self, instances: &[ServiceInstance]) -> EndpointSet<Req, Resp> {
        let mut seen = HashSet::with_capacity(instances.len());
        let mut endpoints = Vec::with_capacity(instances.len());

        for instance in instances {
            let target = instance.target();
            if !seen.insert(target.clone()) {
                continue;
            }

            if let Some(entry) = self.entries.get(&target) {
                endpoints.push(entry.endpoint.clone());
                continue;
            }

            match self.factory.make(&target) {
                Ok((endpoint, closer)) => {
                    debug!(target = %target, instance = %instance.instance_id, "endpoint created");
                    endpoints.push(endpoint.clone());
                    self.entries.insert(target, Entry { endpoint, closer });
                }
                Err(err) => {
                    warn!(
                        target = %target,
                        instance = %instance.instance_id,
                        error = %err,
                        "failed to create endpoint, instance skipped"
                    );
                }
            }
        }

        self.entries.retain(|target, entry| {
            if seen.contains(target) {
                true
            } else {
                debug!(target = %target, "endpoint removed");
                entry.close();
                false
            }
        });

        Arc::new(endpoints)
    }

    /// 缓存中的目标数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<Req, Resp> Drop for EndpointCache<Req, Resp> {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.close();
        }
    }
}
