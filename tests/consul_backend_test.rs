//! Consul 后端集成测试
//!
//! 这些测试需要运行中的 Consul agent。
//! 默认情况下，测试会被忽略，需要使用
//! `cargo test --features consul --test consul_backend_test -- --ignored` 运行。
//!
//! 启动 Consul：
//! ```bash
//! docker run -d --name consul-test -p 8500:8500 hashicorp/consul:1.17 agent -dev -client=0.0.0.0
//! ```

#![cfg(feature = "consul")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{call_all, eventually, FactoryProbe};
use flare_endpoint::discovery::{
    ConsulRegistry, QueryOptions, RegistryClient, RegistrySubscriber, ServiceInstance, Subscriber,
    SubscriberConfig,
};

/// Consul 地址，可以通过环境变量 CONSUL_URL 覆盖
fn consul_url() -> String {
    std::env::var("CONSUL_URL").unwrap_or_else(|_| "http://127.0.0.1:8500".to_string())
}

const TEST_SERVICE: &str = "flare-endpoint-test";

fn test_instance(id: &str, port: u16, tags: &[&str]) -> ServiceInstance {
    ServiceInstance::new(TEST_SERVICE, id, "127.0.0.1", port).with_tags(tags.iter().copied())
}

/// 测试：注册、查询与注销
#[tokio::test]
#[ignore]
async fn test_register_query_deregister() {
    let registry = ConsulRegistry::new(consul_url());
    let instance = test_instance("consul-test-0", 18080, &["api", "v1"]);

    registry
        .register(instance.clone())
        .await
        .expect("register should succeed");

    let options = QueryOptions {
        tag: Some("api".to_string()),
        ..QueryOptions::default()
    };
    let (instances, meta) = registry
        .service(TEST_SERVICE, &options)
        .await
        .expect("query should succeed");
    assert!(meta.last_index > 0);
    let found = instances
        .iter()
        .find(|inst| inst.instance_id == "consul-test-0")
        .expect("registered instance");
    assert_eq!(found.target(), "127.0.0.1:18080");
    assert!(found.has_tags(&["api", "v1"]));

    registry
        .deregister("consul-test-0")
        .await
        .expect("deregister should succeed");
}

/// 测试：阻塞查询在服务变化后返回新的索引
#[tokio::test]
#[ignore]
async fn test_blocking_query_observes_changes() {
    let registry = Arc::new(ConsulRegistry::new(consul_url()));
    registry
        .register(test_instance("consul-test-1", 18081, &["api"]))
        .await
        .expect("register");

    let (_, meta) = registry
        .service(TEST_SERVICE, &QueryOptions::default())
        .await
        .expect("initial query");

    let waiter = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let options = QueryOptions {
                wait_index: meta.last_index,
                wait_time: Some(Duration::from_secs(10)),
                ..QueryOptions::default()
            };
            registry.service(TEST_SERVICE, &options).await
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    registry
        .register(test_instance("consul-test-2", 18082, &["api"]))
        .await
        .expect("register second");

    let (instances, next) = waiter.await.expect("join").expect("blocking query");
    assert!(next.last_index > meta.last_index);
    assert!(instances.iter().any(|inst| inst.instance_id == "consul-test-2"));

    for id in ["consul-test-1", "consul-test-2"] {
        registry.deregister(id).await.expect("deregister");
    }
}

/// 测试：订阅者跟随 Consul 中的实例变化
#[tokio::test]
#[ignore]
async fn test_subscriber_follows_consul() {
    let registry = Arc::new(ConsulRegistry::new(consul_url()));
    registry
        .register(test_instance("consul-test-3", 18083, &["api"]))
        .await
        .expect("register");

    let probe = FactoryProbe::default();
    let client: Arc<dyn RegistryClient> = registry.clone();
    // 未配置健康检查的服务在 Consul 中视为 passing
    let subscriber = RegistrySubscriber::new(
        client,
        probe.factory(),
        SubscriberConfig::new(TEST_SERVICE)
            .with_tags(["api"])
            .with_wait_time(Duration::from_secs(2)),
    )
    .await
    .expect("subscriber");

    let endpoints = subscriber.endpoints().expect("endpoints");
    assert_eq!(call_all(&endpoints).await, vec!["127.0.0.1:18083".to_string()]);

    registry.deregister("consul-test-3").await.expect("deregister");
    assert!(eventually(|| subscriber.endpoints().map(|set| set.is_empty()).unwrap_or(false)).await);
    assert_eq!(probe.closed(), vec!["127.0.0.1:18083".to_string()]);
}
