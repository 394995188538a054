//! 内存注册中心
//!
//! 进程内的注册中心实现，支持与 Consul 相同的阻塞查询语义（索引 + 等待时间），
//! 适用于静态部署和测试。可以通过 [`MemoryRegistry::set_unavailable`] 模拟故障。

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use super::{QueryMeta, QueryOptions, RegistryClient, RegistryError};
use crate::discovery::instance::ServiceInstance;

/// 未指定等待时间时的阻塞查询上限
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

struct State {
    index: u64,
    instances: Vec<ServiceInstance>,
    unavailable: bool,
}

/// 内存注册中心
pub struct MemoryRegistry {
    state: Mutex<State>,
    index_tx: watch::Sender<u64>,
}

impl MemoryRegistry {
    /// 创建空的注册中心
    pub fn new() -> Self {
        Self::with_instances(Vec::new())
    }

    /// 使用初始实例创建注册中心
    pub fn with_instances(instances: Vec<ServiceInstance>) -> Self {
        let (index_tx, _) = watch::channel(1);
        Self {
            state: Mutex::new(State {
                index: 1,
                instances,
                unavailable: false,
            }),
            index_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bump(&self, state: &mut State) {
        state.index += 1;
        self.index_tx.send_replace(state.index);
    }

    /// 整体替换某个服务的全部实例
    pub fn set_instances(&self, service: &str, instances: Vec<ServiceInstance>) {
        let mut state = self.lock();
        state.instances.retain(|inst| inst.service_name != service);
        state.instances.extend(instances);
        self.bump(&mut state);
    }

    /// 模拟注册中心不可用
    pub fn set_unavailable(&self, unavailable: bool) {
        let mut state = self.lock();
        state.unavailable = unavailable;
        // 唤醒阻塞查询，让订阅者立即感知故障
        self.bump(&mut state);
    }

    /// 当前变更索引
    pub fn index(&self) -> u64 {
        self.lock().index
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn service(
        &self,
        service: &str,
        options: &QueryOptions,
    ) -> Result<(Vec<ServiceInstance>, QueryMeta), RegistryError> {
        if options.wait_index > 0 {
            let mut rx = self.index_tx.subscribe();
            let deadline = Instant::now() + options.wait_time.unwrap_or(DEFAULT_MAX_WAIT);
            loop {
                let current = *rx.borrow_and_update();
                if current > options.wait_index {
                    break;
                }
                match tokio::time::timeout_at(deadline, rx.changed()).await {
                    Ok(Ok(())) => continue,
                    // 等待超时：返回当前数据，与 Consul 行为一致
                    Ok(Err(_)) | Err(_) => break,
                }
            }
        }

        let state = self.lock();
        if state.unavailable {
            return Err(RegistryError::Unreachable(
                "memory registry marked unavailable".to_string(),
            ));
        }

        let instances: Vec<ServiceInstance> = state
            .instances
            .iter()
            .filter(|inst| inst.service_name == service)
            .filter(|inst| {
                options
                    .tag
                    .as_ref()
                    .map(|tag| inst.tags.iter().any(|t| t == tag))
                    .unwrap_or(true)
            })
            .filter(|inst| !options.passing_only || inst.is_passing())
            .cloned()
            .collect();

        debug!(
            service = %service,
            count = instances.len(),
            index = state.index,
            "memory registry query"
        );

        Ok((
            instances,
            QueryMeta {
                last_index: state.index,
            },
        ))
    }

    async fn register(&self, instance: ServiceInstance) -> Result<(), RegistryError> {
        let mut state = self.lock();
        state
            .instances
            .retain(|inst| inst.instance_id != instance.instance_id);
        state.instances.push(instance);
        self.bump(&mut state);
        Ok(())
    }

    async fn deregister(&self, instance_id: &str) -> Result<(), RegistryError> {
        let mut state = self.lock();
        let before = state.instances.len();
        state.instances.retain(|inst| inst.instance_id != instance_id);
        if state.instances.len() == before {
            return Err(RegistryError::NotFound(instance_id.to_string()));
        }
        self.bump(&mut state);
        Ok(())
    }
}
