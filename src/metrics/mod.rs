//! 指标收集模块
//!
//! 中间件把每次调用的方法名、耗时和成败上报给注入的 [`MetricsSink`]，
//! 本库不规定指标的具体格式。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// 每个方法最多保留的耗时样本数
const MAX_DURATION_SAMPLES: usize = 1000;

/// 指标上报接口
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn observe(&self, method: &str, duration: Duration, success: bool);
}

#[async_trait]
impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    async fn observe(&self, method: &str, duration: Duration, success: bool) {
        (**self).observe(method, duration, success).await
    }
}

/// 丢弃所有指标
#[derive(Debug, Clone, Copy, Default)]
pub struct NopSink;

#[async_trait]
impl MetricsSink for NopSink {
    async fn observe(&self, _method: &str, _duration: Duration, _success: bool) {}
}

/// 指标数据
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pub requests_total: u64,
    pub requests_success: u64,
    pub requests_failed: u64,
    pub request_duration_ms: Vec<u64>,
}

impl Metrics {
    /// 平均耗时（毫秒）
    pub fn average_duration_ms(&self) -> Option<f64> {
        if self.request_duration_ms.is_empty() {
            return None;
        }
        let sum: u64 = self.request_duration_ms.iter().sum();
        Some(sum as f64 / self.request_duration_ms.len() as f64)
    }
}

/// 内存指标收集器（按方法统计）
#[derive(Clone)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<HashMap<String, Metrics>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record_request(&self, method: &str, success: bool, duration: Duration) {
        let mut metrics = self.metrics.write().await;
        let metrics = metrics.entry(method.to_string()).or_default();
        metrics.requests_total += 1;

        if success {
            metrics.requests_success += 1;
        } else {
            metrics.requests_failed += 1;
        }

        metrics
            .request_duration_ms
            .push(duration.as_millis() as u64);

        // 只保留最近 1000 个请求的耗时
        if metrics.request_duration_ms.len() > MAX_DURATION_SAMPLES {
            metrics.request_duration_ms.remove(0);
        }
    }

    /// 获取某个方法的指标
    pub async fn get_metrics(&self, method: &str) -> Option<Metrics> {
        self.metrics.read().await.get(method).cloned()
    }

    /// 获取全部方法的指标
    pub async fn snapshot(&self) -> HashMap<String, Metrics> {
        self.metrics.read().await.clone()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSink for MetricsCollector {
    async fn observe(&self, method: &str, duration: Duration, success: bool) {
        self.record_request(method, success, duration).await;
    }
}
