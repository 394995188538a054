//! 集成测试公共工具

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flare_endpoint::discovery::{factory_fn, Closer, Factory, ServiceInstance};
use flare_endpoint::{boxed, endpoint_fn, BoxEndpoint, Context, Endpoint};

/// 测试服务名
pub const SERVICE: &str = "search";

/// 注册中心中的测试实例
///
/// - search-api-0：tags {api, v1}
/// - search-api-1：tags {api, v2}
/// - search-db-0：tags {db}，服务级地址与节点地址不同
pub fn fixture_instances() -> Vec<ServiceInstance> {
    vec![
        ServiceInstance::new(SERVICE, "search-api-0", "10.0.0.0", 8000).with_tags(["api", "v1"]),
        ServiceInstance::new(SERVICE, "search-api-1", "10.0.0.1", 8001).with_tags(["api", "v2"]),
        ServiceInstance::new(SERVICE, "search-db-0", "10.0.0.1", 9000)
            .with_service_address("10.0.0.10")
            .with_tag("db"),
    ]
}

/// 返回自身拨号目标的 Endpoint
pub fn echo_endpoint(target: &str) -> BoxEndpoint<String, String> {
    let target = target.to_string();
    boxed(endpoint_fn(move |_ctx: Context, _req: String| {
        let target = target.clone();
        async move { Ok(target) }
    }))
}

/// 记录工厂调用和关闭情况的回显工厂
#[derive(Clone, Default)]
pub struct FactoryProbe {
    pub made: Arc<AtomicUsize>,
    pub closed: Arc<Mutex<Vec<String>>>,
}

impl FactoryProbe {
    pub fn made(&self) -> usize {
        self.made.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().expect("closed lock").clone()
    }

    pub fn factory(&self) -> impl Factory<String, String> + 'static {
        let probe = self.clone();
        factory_fn(move |target: &str| {
            probe.made.fetch_add(1, Ordering::SeqCst);
            let closed = probe.closed.clone();
            let owned = target.to_string();
            let closer: Box<dyn Closer> = Box::new(move || {
                closed.lock().expect("closed lock").push(owned.clone());
            });
            Ok((echo_endpoint(target), Some(closer)))
        })
    }
}

/// 调用集合中的每个 Endpoint，返回排序后的目标列表
pub async fn call_all(endpoints: &[BoxEndpoint<String, String>]) -> Vec<String> {
    let mut targets = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let target = endpoint
            .call(Context::background(), String::new())
            .await
            .expect("echo endpoint never fails");
        targets.push(target);
    }
    targets.sort();
    targets
}

/// 轮询直到条件成立，最多等待 2 秒
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
