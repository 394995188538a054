//! 订阅者集成测试
//!
//! 使用内存注册中心验证标签过滤、地址覆盖、快照原子性、停止语义和错误策略。

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{call_all, eventually, fixture_instances, FactoryProbe, SERVICE};
use flare_endpoint::discovery::{
    ErrorPolicy, HealthStatus, MemoryRegistry, QueryMeta, QueryOptions, RegistryClient,
    RegistryError, RegistrySubscriber, ServiceInstance, Subscriber, SubscriberConfig,
};
use flare_endpoint::EndpointError;

async fn subscribe(
    registry: &Arc<MemoryRegistry>,
    probe: &FactoryProbe,
    config: SubscriberConfig,
) -> RegistrySubscriber<String, String> {
    let client: Arc<dyn RegistryClient> = registry.clone();
    RegistrySubscriber::new(client, probe.factory(), config)
        .await
        .expect("initial fetch should succeed")
}

/// 测试：按标签过滤（包含关系而非相等）
#[tokio::test]
async fn test_tag_filtering() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();

    let api = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE).with_tags(["api"])).await;
    let endpoints = api.endpoints().expect("endpoints");
    assert_eq!(
        call_all(&endpoints).await,
        vec!["10.0.0.0:8000".to_string(), "10.0.0.1:8001".to_string()]
    );

    let api_v2 = subscribe(
        &registry,
        &probe,
        SubscriberConfig::new(SERVICE).with_tags(["api", "v2"]),
    )
    .await;
    let endpoints = api_v2.endpoints().expect("endpoints");
    assert_eq!(call_all(&endpoints).await, vec!["10.0.0.1:8001".to_string()]);

    let all = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE)).await;
    assert_eq!(all.endpoints().expect("endpoints").len(), 3);
    assert_eq!(all.instances().len(), 3);
}

/// 测试：服务级地址优先于节点地址
#[tokio::test]
async fn test_service_address_override() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();

    let db = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE).with_tags(["db"])).await;
    let endpoints = db.endpoints().expect("endpoints");
    assert_eq!(call_all(&endpoints).await, vec!["10.0.0.10:9000".to_string()]);
}

/// 测试：不存在的服务返回空集合而不是错误
#[tokio::test]
async fn test_unknown_service_is_empty() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();

    let sub = subscribe(&registry, &probe, SubscriberConfig::new("no-such-service")).await;
    assert!(sub.endpoints().expect("endpoints").is_empty());
    assert_eq!(probe.made(), 0);
}

/// 测试：首次拉取失败时创建失败
#[tokio::test]
async fn test_initial_fetch_failure() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    registry.set_unavailable(true);
    let client: Arc<dyn RegistryClient> = registry.clone();

    let result = RegistrySubscriber::new(
        client,
        FactoryProbe::default().factory(),
        SubscriberConfig::new(SERVICE),
    )
    .await;
    assert!(matches!(result, Err(EndpointError::RegistryUnavailable(_))));
}

/// 测试：健康过滤开关
#[tokio::test]
async fn test_passing_only_filter() {
    let mut instances = fixture_instances();
    instances[0].health = HealthStatus::Critical;
    let registry = Arc::new(MemoryRegistry::with_instances(instances));
    let probe = FactoryProbe::default();

    let healthy = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE)).await;
    assert_eq!(healthy.endpoints().expect("endpoints").len(), 2);

    let everything = subscribe(
        &registry,
        &probe,
        SubscriberConfig::new(SERVICE).with_passing_only(false),
    )
    .await;
    assert_eq!(everything.endpoints().expect("endpoints").len(), 3);
}

/// 测试：注册中心变化后快照更新，未变化的目标复用 Endpoint，移除的目标被关闭
#[tokio::test]
async fn test_updates_reuse_and_close_endpoints() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();
    let sub = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE)).await;
    assert_eq!(probe.made(), 3);

    // 移除 search-db-0，新增 search-api-2
    let mut next = fixture_instances();
    next.pop();
    next.push(ServiceInstance::new(SERVICE, "search-api-2", "10.0.0.2", 8002).with_tag("api"));
    registry.set_instances(SERVICE, next);

    assert!(
        eventually(|| sub
            .instances()
            .iter()
            .any(|inst| inst.instance_id == "search-api-2"))
        .await
    );

    let endpoints = sub.endpoints().expect("endpoints");
    assert_eq!(
        call_all(&endpoints).await,
        vec![
            "10.0.0.0:8000".to_string(),
            "10.0.0.1:8001".to_string(),
            "10.0.0.2:8002".to_string()
        ]
    );
    assert_eq!(probe.made(), 4);
    assert_eq!(probe.closed(), vec!["10.0.0.10:9000".to_string()]);
}

/// 测试：停止后不再更新，但继续返回最后的快照
#[tokio::test]
async fn test_stop_keeps_last_snapshot() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();
    let sub = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE)).await;

    sub.stop();
    sub.stop();
    assert!(sub.is_stopped());

    registry.set_instances(SERVICE, Vec::new());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(sub.endpoints().expect("endpoints").len(), 3);
    assert!(probe.closed().is_empty());

    drop(sub);
    assert_eq!(probe.closed().len(), 3);
}

/// 测试：注册中心故障时默认继续提供旧快照
#[tokio::test]
async fn test_serve_stale_on_registry_outage() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();
    let sub = subscribe(&registry, &probe, SubscriberConfig::new(SERVICE)).await;

    registry.set_unavailable(true);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let endpoints = sub.endpoints().expect("stale snapshot is served");
    assert_eq!(endpoints.len(), 3);
}

/// 测试：fail-closed 策略在故障期间报错，恢复后继续工作
#[tokio::test]
async fn test_fail_closed_on_registry_outage() {
    let registry = Arc::new(MemoryRegistry::with_instances(fixture_instances()));
    let probe = FactoryProbe::default();
    let sub = subscribe(
        &registry,
        &probe,
        SubscriberConfig::new(SERVICE).with_error_policy(ErrorPolicy::FailClosed),
    )
    .await;

    registry.set_unavailable(true);
    assert!(
        eventually(|| matches!(
            sub.endpoints(),
            Err(EndpointError::RegistryUnavailable(_))
        ))
        .await
    );

    registry.set_unavailable(false);
    assert!(eventually(|| sub.endpoints().is_ok()).await);
    assert_eq!(sub.endpoints().expect("recovered").len(), 3);
}

/// 测试：并发读取永远看不到新旧混合的集合
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_atomicity() {
    fn generation(prefix: &str, count: usize) -> Vec<ServiceInstance> {
        (0..count)
            .map(|i| {
                ServiceInstance::new(SERVICE, format!("{prefix}-{i}"), format!("{prefix}.0.0.{i}"), 80)
            })
            .collect()
    }

    let registry = Arc::new(MemoryRegistry::with_instances(generation("10", 3)));
    let probe = FactoryProbe::default();
    let sub = Arc::new(subscribe(&registry, &probe, SubscriberConfig::new(SERVICE)).await);

    let writer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for round in 0..50 {
                let next = if round % 2 == 0 {
                    generation("11", 5)
                } else {
                    generation("10", 3)
                };
                registry.set_instances(SERVICE, next);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let sub = sub.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let endpoints = sub.endpoints().expect("endpoints");
                let targets = call_all(&endpoints).await;
                let len = targets.len();
                assert!(len == 3 || len == 5, "torn snapshot of size {len}");
                let prefix = if len == 3 { "10." } else { "11." };
                assert!(
                    targets.iter().all(|t| t.starts_with(prefix)),
                    "mixed snapshot: {targets:?}"
                );
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.expect("writer");
    for reader in readers {
        reader.await.expect("reader");
    }
}

/// 不支持阻塞查询的注册中心：立即返回，索引始终为 0
#[derive(Default)]
struct NonBlockingRegistry {
    wait_indexes: Mutex<Vec<u64>>,
}

impl NonBlockingRegistry {
    fn wait_indexes(&self) -> Vec<u64> {
        self.wait_indexes.lock().expect("wait index lock").clone()
    }
}

#[async_trait]
impl RegistryClient for NonBlockingRegistry {
    async fn service(
        &self,
        _service: &str,
        options: &QueryOptions,
    ) -> Result<(Vec<ServiceInstance>, QueryMeta), RegistryError> {
        self.wait_indexes
            .lock()
            .expect("wait index lock")
            .push(options.wait_index);
        Ok((fixture_instances(), QueryMeta { last_index: 0 }))
    }

    async fn register(&self, _instance: ServiceInstance) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn deregister(&self, _instance_id: &str) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// 测试：注册中心不阻塞时按 wait_time 间隔轮询，索引至少为 1
#[tokio::test(start_paused = true)]
async fn test_non_blocking_registry_is_not_hammered() {
    let registry = Arc::new(NonBlockingRegistry::default());
    let client: Arc<dyn RegistryClient> = registry.clone();
    let probe = FactoryProbe::default();
    let sub = RegistrySubscriber::new(
        client,
        probe.factory(),
        SubscriberConfig::new(SERVICE).with_wait_time(Duration::from_secs(1)),
    )
    .await
    .expect("initial fetch should succeed");

    tokio::time::sleep(Duration::from_millis(5500)).await;

    let wait_indexes = registry.wait_indexes();
    // 首次拉取、索引归一化后的一次查询，以及此后每秒一次
    assert_eq!(wait_indexes.len(), 8, "{wait_indexes:?}");
    assert_eq!(wait_indexes[..2], [0, 0]);
    assert!(wait_indexes[2..].iter().all(|&index| index == 1));
    assert_eq!(sub.endpoints().expect("endpoints").len(), 3);
}
