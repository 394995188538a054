//! 服务订阅者
//!
//! 订阅者维护某个服务的实时实例视图，并把每个实例转换为 Endpoint。
//! 快照通过 `ArcSwap` 整体替换：读者要么看到完整的旧集合，要么看到完整的新集合。

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::{QueryOptions, RegistryClient, RegistryError};
use super::cache::{EndpointCache, EndpointSet};
use super::config::{ErrorPolicy, SubscriberConfig};
use super::factory::Factory;
use super::instance::ServiceInstance;
use crate::endpoint::BoxEndpoint;
use crate::error::{EndpointError, Result};
use crate::retry::{ExponentialBackoffPolicy, RetryPolicy};

/// 拉取失败后的初始退避
const POLL_BACKOFF_BASE: Duration = Duration::from_millis(10);
/// 拉取失败后的最大退避
const POLL_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// 下一次阻塞查询使用的索引
///
/// 索引回退（注册中心重建等）时采用新的索引；索引至少为 1，
/// 否则查询不会阻塞。
fn next_index(previous: u64, reported: u64) -> u64 {
    if reported < previous {
        debug!(previous, reported, "registry index went backwards");
    }
    reported.max(1)
}

/// 订阅者 trait
pub trait Subscriber<Req, Resp>: Send + Sync {
    /// 当前 Endpoint 快照
    fn endpoints(&self) -> Result<EndpointSet<Req, Resp>>;
}

impl<Req, Resp, S> Subscriber<Req, Resp> for Arc<S>
where
    S: Subscriber<Req, Resp> + ?Sized,
{
    fn endpoints(&self) -> Result<EndpointSet<Req, Resp>> {
        (**self).endpoints()
    }
}

/// 固定 Endpoint 集合
pub struct FixedSubscriber<Req, Resp> {
    endpoints: EndpointSet<Req, Resp>,
}

impl<Req, Resp> FixedSubscriber<Req, Resp> {
    pub fn new(endpoints: Vec<BoxEndpoint<Req, Resp>>) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
        }
    }
}

impl<Req, Resp> Subscriber<Req, Resp> for FixedSubscriber<Req, Resp> {
    fn endpoints(&self) -> Result<EndpointSet<Req, Resp>> {
        Ok(self.endpoints.clone())
    }
}

/// 订阅者快照
struct Snapshot<Req, Resp> {
    endpoints: EndpointSet<Req, Resp>,
    instances: Arc<Vec<ServiceInstance>>,
    index: u64,
    last_error: Option<EndpointError>,
}

impl<Req, Resp> Clone for Snapshot<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            endpoints: self.endpoints.clone(),
            instances: self.instances.clone(),
            index: self.index,
            last_error: self.last_error.clone(),
        }
    }
}

struct Shared<Req, Resp> {
    client: Arc<dyn RegistryClient>,
    config: SubscriberConfig,
    snapshot: ArcSwap<Snapshot<Req, Resp>>,
    cache: Mutex<EndpointCache<Req, Resp>>,
}

impl<Req, Resp> Shared<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn query_options(&self, wait_index: u64) -> QueryOptions {
        QueryOptions {
            // 注册中心只支持单个标签过滤，其余标签在本地检查
            tag: self.config.tags.first().cloned(),
            passing_only: self.config.passing_only,
            wait_index,
            wait_time: Some(self.config.wait_time()),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, EndpointCache<Req, Resp>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, instances: Vec<ServiceInstance>, index: u64) {
        let instances: Vec<ServiceInstance> = instances
            .into_iter()
            .filter(|inst| inst.has_tags(&self.config.tags))
            .filter(|inst| !self.config.passing_only || inst.is_passing())
            .collect();

        let endpoints = self.lock_cache().update(&instances);

        debug!(
            service = %self.config.service_name,
            instances = instances.len(),
            endpoints = endpoints.len(),
            index,
            "subscriber snapshot updated"
        );

        self.snapshot.store(Arc::new(Snapshot {
            endpoints,
            instances: Arc::new(instances),
            index,
            last_error: None,
        }));
    }

    fn record_error(&self, err: &RegistryError) {
        let mut next = Snapshot::clone(&self.snapshot.load());
        next.last_error = Some(EndpointError::registry_unavailable(err.to_string()));
        self.snapshot.store(Arc::new(next));
    }

    async fn watch(self: Arc<Self>, token: CancellationToken) {
        let backoff = ExponentialBackoffPolicy::new(POLL_BACKOFF_BASE, POLL_BACKOFF_MAX);
        let mut failures = 0usize;
        let mut index = self.snapshot.load().index;

        loop {
            let options = self.query_options(index);
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                res = self.client.service(&self.config.service_name, &options) => res,
            };

            let pause = match result {
                Ok((instances, meta)) => {
                    failures = 0;
                    let next = next_index(index, meta.last_index);
                    // 索引未推进且没有等满 wait_time：注册中心不支持阻塞查询
                    let blocked = next != index || started.elapsed() >= self.config.wait_time();
                    index = next;
                    self.publish(instances, index);
                    if blocked {
                        self.config.refresh_interval()
                    } else {
                        let pause = self
                            .config
                            .refresh_interval()
                            .unwrap_or_else(|| self.config.wait_time())
                            .max(POLL_BACKOFF_BASE);
                        debug!(
                            service = %self.config.service_name,
                            index,
                            pause_ms = pause.as_millis() as u64,
                            "registry query returned without blocking"
                        );
                        Some(pause)
                    }
                }
                Err(err) => {
                    failures += 1;
                    let delay = backoff.backoff_duration(failures);
                    warn!(
                        service = %self.config.service_name,
                        error = %err,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "registry poll failed"
                    );
                    self.record_error(&err);
                    Some(delay)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        debug!(service = %self.config.service_name, "subscriber watch stopped");
    }
}

/// 基于注册中心的订阅者
///
/// 创建时同步拉取一次实例列表，随后由一个后台任务持续长轮询。
pub struct RegistrySubscriber<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
    token: CancellationToken,
}

impl<Req, Resp> RegistrySubscriber<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// 创建订阅者
    ///
    /// 首次拉取失败时返回 `RegistryUnavailable`。必须在 tokio 运行时中调用。
    pub async fn new<F>(
        client: Arc<dyn RegistryClient>,
        factory: F,
        config: SubscriberConfig,
    ) -> Result<Self>
    where
        F: Factory<Req, Resp> + 'static,
    {
        let factory: Arc<dyn Factory<Req, Resp>> = Arc::new(factory);
        let shared = Arc::new(Shared {
            client,
            config,
            snapshot: ArcSwap::from_pointee(Snapshot {
                endpoints: Arc::new(Vec::new()),
                instances: Arc::new(Vec::new()),
                index: 0,
                last_error: None,
            }),
            cache: Mutex::new(EndpointCache::new(factory)),
        });

        let options = shared.query_options(0);
        let (instances, meta) = shared
            .client
            .service(&shared.config.service_name, &options)
            .await
            .map_err(|err| EndpointError::registry_unavailable(err.to_string()))?;
        shared.publish(instances, meta.last_index);

        info!(
            service = %shared.config.service_name,
            tags = ?shared.config.tags,
            endpoints = shared.snapshot.load().endpoints.len(),
            "subscriber started"
        );

        let token = CancellationToken::new();
        tokio::spawn(shared.clone().watch(token.clone()));

        Ok(Self { shared, token })
    }

    /// 当前过滤后的实例列表
    pub fn instances(&self) -> Arc<Vec<ServiceInstance>> {
        self.shared.snapshot.load().instances.clone()
    }

    /// 最近一次成功拉取的索引
    pub fn index(&self) -> u64 {
        self.shared.snapshot.load().index
    }

    /// 服务名称
    pub fn service_name(&self) -> &str {
        &self.shared.config.service_name
    }
}

impl<Req, Resp> RegistrySubscriber<Req, Resp> {
    /// 停止后台监听（幂等）
    ///
    /// 停止后 `endpoints()` 继续返回最后一次的快照。
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!(service = %self.shared.config.service_name, "stopping subscriber");
            self.token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<Req, Resp> Subscriber<Req, Resp> for RegistrySubscriber<Req, Resp> {
    fn endpoints(&self) -> Result<EndpointSet<Req, Resp>> {
        let snapshot = self.shared.snapshot.load();
        match (&snapshot.last_error, self.shared.config.error_policy) {
            (Some(err), ErrorPolicy::FailClosed) => Err(err.clone()),
            _ => Ok(snapshot.endpoints.clone()),
        }
    }
}

impl<Req, Resp> Drop for RegistrySubscriber<Req, Resp> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
