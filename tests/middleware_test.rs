//! Endpoint 中间件与适配器集成测试

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flare_endpoint::transport::{Client, RoundTrip, Server};
use flare_endpoint::{
    boxed, chain, compose, endpoint_fn, middleware_fn, BoxEndpoint, BoxMiddleware, Context,
    Endpoint, EndpointError, EndpointService, InstrumentingMiddleware, LoggingMiddleware,
    Middleware, MetricsCollector, RequestId, TimeoutMiddleware,
};
use tower::ServiceExt;

type Log = Arc<Mutex<Vec<String>>>;

/// 在调用前后记录自己名字的中间件
fn tagging(name: &'static str, log: Log) -> BoxMiddleware<String, String> {
    Arc::new(middleware_fn(move |next: BoxEndpoint<String, String>| {
        let log = log.clone();
        boxed(endpoint_fn(move |ctx: Context, req: String| {
            let next = next.clone();
            let log = log.clone();
            async move {
                log.lock().expect("log lock").push(format!("{name}>"));
                let resp = next.call(ctx, req).await?;
                log.lock().expect("log lock").push(format!("<{name}"));
                Ok(resp)
            }
        }))
    }))
}

fn recording_endpoint(log: Log) -> BoxEndpoint<String, String> {
    boxed(endpoint_fn(move |_ctx: Context, req: String| {
        let log = log.clone();
        async move {
            log.lock().expect("log lock").push("endpoint".to_string());
            Ok(req.to_uppercase())
        }
    }))
}

fn upper() -> BoxEndpoint<String, String> {
    boxed(endpoint_fn(|_ctx: Context, req: String| async move {
        Ok(req.to_uppercase())
    }))
}

/// 测试：组合列表中第一个中间件位于最外层
#[tokio::test]
async fn test_compose_order() {
    let log: Log = Arc::default();
    let endpoint = compose(
        &[
            tagging("a", log.clone()),
            tagging("b", log.clone()),
            tagging("c", log.clone()),
        ],
        recording_endpoint(log.clone()),
    );

    let resp = endpoint
        .call(Context::background(), "hi".to_string())
        .await
        .expect("call");
    assert_eq!(resp, "HI");
    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["a>", "b>", "c>", "endpoint", "<c", "<b", "<a"]
    );
}

/// 测试：chain 与 compose 的嵌套顺序一致
#[tokio::test]
async fn test_chain_matches_compose() {
    let log: Log = Arc::default();
    let middleware = chain(tagging("outer", log.clone()), vec![tagging("inner", log.clone())]);
    let endpoint = middleware.wrap(recording_endpoint(log.clone()));

    endpoint
        .call(Context::background(), "x".to_string())
        .await
        .expect("call");
    assert_eq!(
        *log.lock().expect("log lock"),
        vec!["outer>", "inner>", "endpoint", "<inner", "<outer"]
    );
}

/// 测试：中间件之间通过上下文传递请求级别的值
#[tokio::test]
async fn test_context_values_flow_through_middleware() {
    let seen: Arc<Mutex<Option<RequestId>>> = Arc::default();
    let capture = {
        let seen = seen.clone();
        boxed(endpoint_fn(move |ctx: Context, req: String| {
            *seen.lock().expect("seen lock") = ctx.value::<RequestId>().cloned();
            async move { Ok(req) }
        }))
    };
    let endpoint = LoggingMiddleware::new("echo").wrap(capture);

    let id = RequestId::generate();
    let ctx = Context::background().with_value(id.clone());
    endpoint.call(ctx, "ping".to_string()).await.expect("call");

    assert_eq!(seen.lock().expect("seen lock").clone(), Some(id));
}

/// 测试：指标中间件按方法统计成功与失败
#[tokio::test]
async fn test_instrumenting_records_outcomes() {
    let collector = MetricsCollector::new();
    let flaky = boxed(endpoint_fn(|_ctx: Context, req: String| async move {
        if req.is_empty() {
            Err(EndpointError::transport("empty request"))
        } else {
            Ok(req)
        }
    }));
    let endpoint = InstrumentingMiddleware::new("echo", collector.clone()).wrap(flaky);

    endpoint
        .call(Context::background(), "a".to_string())
        .await
        .expect("ok");
    endpoint
        .call(Context::background(), "b".to_string())
        .await
        .expect("ok");
    endpoint
        .call(Context::background(), String::new())
        .await
        .expect_err("empty");

    let metrics = collector.get_metrics("echo").await.expect("metrics");
    assert_eq!(metrics.requests_total, 3);
    assert_eq!(metrics.requests_success, 2);
    assert_eq!(metrics.requests_failed, 1);
    assert_eq!(metrics.request_duration_ms.len(), 3);
    assert!(collector.get_metrics("other").await.is_none());
}

/// 测试：超时中间件截断慢调用
#[tokio::test(start_paused = true)]
async fn test_timeout_middleware() {
    let slow = boxed(endpoint_fn(|_ctx: Context, req: String| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(req)
    }));
    let endpoint = TimeoutMiddleware::new(Duration::from_millis(50)).wrap(slow);

    let start = tokio::time::Instant::now();
    let err = endpoint
        .call(Context::background(), "late".to_string())
        .await
        .expect_err("timeout");
    assert!(matches!(err, EndpointError::DeadlineExceeded));
    assert_eq!(start.elapsed(), Duration::from_millis(50));

    // 调用方更早的截止时间优先
    let endpoint = TimeoutMiddleware::new(Duration::from_secs(10)).wrap(upper());
    let ctx = Context::background().with_timeout(Duration::ZERO);
    let err = endpoint
        .call(ctx, "x".to_string())
        .await
        .expect_err("caller deadline");
    assert!(matches!(err, EndpointError::DeadlineExceeded));
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("account {0} is frozen")]
struct Frozen(u64);

/// 测试：业务错误穿过中间件后仍可还原为原始类型
#[tokio::test]
async fn test_business_error_passthrough() {
    let failing: BoxEndpoint<u64, u64> = boxed(endpoint_fn(|_ctx: Context, account: u64| async move {
        Err::<u64, _>(EndpointError::business(Frozen(account)))
    }));
    let endpoint = compose(
        &[
            Arc::new(LoggingMiddleware::new("withdraw")) as BoxMiddleware<u64, u64>,
            Arc::new(TimeoutMiddleware::new(Duration::from_secs(1))) as BoxMiddleware<u64, u64>,
        ],
        failing,
    );

    let err = endpoint
        .call(Context::background(), 42)
        .await
        .expect_err("frozen");
    assert!(!err.is_infrastructure());
    assert_eq!(err.downcast_business::<Frozen>(), Some(&Frozen(42)));
    assert_eq!(err.to_string(), "account 42 is frozen");
}

/// 测试：Endpoint 可以作为 tower Service 驱动
#[tokio::test]
async fn test_endpoint_service_bridge() {
    let service = EndpointService::new(upper());

    let resp = service
        .clone()
        .oneshot((Context::background(), "tower".to_string()))
        .await
        .expect("oneshot");
    assert_eq!(resp, "TOWER");

    let cancelled = Context::background();
    cancelled.cancel();
    let guarded = EndpointService::new(TimeoutMiddleware::new(Duration::from_secs(1)).wrap(upper()));
    let err = guarded
        .oneshot((cancelled, "x".to_string()))
        .await
        .expect_err("cancelled");
    assert!(matches!(err, EndpointError::Cancelled));
}

/// 线路格式：`"<request-id>|<payload>"`
fn wire_server() -> Server<String, String, String, String> {
    Server::new(
        upper(),
        |wire: String| {
            wire.split_once('|')
                .map(|(_, payload)| payload.to_string())
                .ok_or_else(|| EndpointError::transport("malformed frame"))
        },
        |resp: String| Ok(format!("ok|{resp}")),
        |err: &EndpointError| format!("err|{}|{}", err.code(), err),
    )
    .with_before(|ctx: Context, wire: &String| match wire.split_once('|') {
        Some((id, _)) => ctx.with_value(RequestId(id.to_string())),
        None => ctx,
    })
}

/// 测试：服务端适配器解码、调用并编码响应或错误
#[tokio::test]
async fn test_server_adapter() {
    let server = wire_server();

    assert_eq!(
        server.serve(Context::background(), "req-1|hello".to_string()).await,
        "ok|HELLO"
    );

    let resp = server
        .serve(Context::background(), "garbage".to_string())
        .await;
    assert!(resp.starts_with("err|"), "{resp}");
    assert!(resp.contains("malformed frame"), "{resp}");
}

/// 进程内的传输：直接把线路请求交给服务端
struct Loopback {
    server: Arc<Server<String, String, String, String>>,
}

#[async_trait]
impl RoundTrip<String, String> for Loopback {
    async fn round_trip(&self, ctx: &Context, req: String) -> flare_endpoint::Result<String> {
        Ok(self.server.serve(ctx.clone(), req).await)
    }
}

/// 测试：客户端适配器本身是一个 Endpoint
#[tokio::test]
async fn test_client_adapter_round_trip() {
    let client = Client::new(
        Loopback {
            server: Arc::new(wire_server()),
        },
        |req: String| Ok(format!("req-2|{req}")),
        |wire: String| match wire.split_once('|') {
            Some(("ok", payload)) => Ok(payload.to_string()),
            _ => Err(EndpointError::transport("unexpected frame")),
        },
    );
    let endpoint: BoxEndpoint<String, String> = boxed(client);

    let resp = endpoint
        .call(Context::background(), "round trip".to_string())
        .await
        .expect("round trip");
    assert_eq!(resp, "ROUND TRIP");
}
