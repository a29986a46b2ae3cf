#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::Notify;

use poolmeter_client::config::{self, PoolConfig};
use poolmeter_client::http::client::{BYTES_RECEIVED_TOTAL, REQUESTS_TOTAL, REQUEST_DURATION};
use poolmeter_client::pool::metrics::{ACTIVE_CONNECTIONS, MAX_CONNECTIONS};
use poolmeter_client::{HttpClient, PooledConnection, RemoteOperation, Response};
use poolmeter_core::{BoxError, MetricRegistry, MetricsAssertions, PoolMeterError};

/// Looks up a resource group by name; fails for names starting with "missing".
struct ResourceGroupLookup {
    calls: AtomicUsize,
}

#[async_trait]
impl RemoteOperation for ResourceGroupLookup {
    async fn perform(&self, target: &str, _conn: &PooledConnection) -> Result<Response, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        if target.starts_with("missing") {
            return Err(format!("resource group {target} not found").into());
        }
        Ok(Response::new(200, format!("{{\"name\":\"{target}\"}}")))
    }
}

/// Parks every call until released, to hold connections open.
struct Gate {
    open: Notify,
    entered: AtomicUsize,
}

#[async_trait]
impl RemoteOperation for Gate {
    async fn perform(&self, _target: &str, _conn: &PooledConnection) -> Result<Response, BoxError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.open.notified().await;
        Ok(Response::new(204, ""))
    }
}

fn lookup() -> Arc<ResourceGroupLookup> {
    Arc::new(ResourceGroupLookup {
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn successful_request_records_metrics_and_returns_connection() {
    let registry = Arc::new(MetricRegistry::new());
    let cfg = PoolConfig::with_capacity(100);
    let client = HttpClient::from_config(&cfg, Arc::clone(&registry), lookup()).unwrap();

    let resp = client.request("rg-test").await.unwrap();
    assert!(resp.is_success());
    assert_eq!(&resp.body[..], b"{\"name\":\"rg-test\"}");

    assert_eq!(client.pool().current_usage(), 0);
    assert_eq!(client.pool().idle_count(), 1);

    let check = MetricsAssertions::new(&registry);
    check.expect_counter_equals(REQUESTS_TOTAL, &[("outcome", "success")], 1.0, 0.0).unwrap();
    check.expect_counter_equals(REQUESTS_TOTAL, &[("outcome", "failure")], 0.0, 0.0).unwrap();
    check
        .expect_counter_equals(BYTES_RECEIVED_TOTAL, &[], resp.body.len() as f64, 0.0)
        .unwrap();
    check.expect_gauge_equals(MAX_CONNECTIONS, &[], 100.0, 0.0).unwrap();
    assert_eq!(registry.snapshot(REQUEST_DURATION, &[]), Some(1.0));
}

#[tokio::test]
async fn failed_request_wraps_cause_and_releases() {
    let registry = Arc::new(MetricRegistry::new());
    let cfg = PoolConfig::with_capacity(1);
    let client = HttpClient::from_config(&cfg, Arc::clone(&registry), lookup()).unwrap();

    let err = client.request("missing-rg").await.expect_err("must fail");
    assert_eq!(err.code().as_str(), "REQUEST_FAILED");
    assert!(matches!(err, PoolMeterError::RequestFailed { .. }));
    assert_eq!(
        err.source().map(|s| s.to_string()),
        Some("resource group missing-rg not found".to_string())
    );

    // The only connection went back, so the next request is not starved.
    assert_eq!(client.pool().current_usage(), 0);
    client.request("rg-ok").await.unwrap();

    let check = MetricsAssertions::new(&registry);
    check.expect_counter_equals(REQUESTS_TOTAL, &[("outcome", "failure")], 1.0, 0.0).unwrap();
    check.expect_counter_equals(REQUESTS_TOTAL, &[("outcome", "success")], 1.0, 0.0).unwrap();
    assert_eq!(registry.snapshot(REQUEST_DURATION, &[]), Some(2.0));
}

#[tokio::test]
async fn exhausted_pool_surfaces_without_calling_operation() {
    let registry = Arc::new(MetricRegistry::new());
    let gate = Arc::new(Gate {
        open: Notify::new(),
        entered: AtomicUsize::new(0),
    });
    let cfg = PoolConfig {
        acquire_timeout_ms: 0,
        ..PoolConfig::with_capacity(2)
    };
    let client =
        Arc::new(HttpClient::from_config(&cfg, Arc::clone(&registry), gate.clone()).unwrap());

    let in_flight: Vec<_> = (0..2)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request(&format!("rg-{i}")).await })
        })
        .collect();
    while gate.entered.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    MetricsAssertions::new(&registry)
        .expect_gauge_equals(ACTIVE_CONNECTIONS, &[], 2.0, 0.0)
        .unwrap();

    let err = client.request("rg-extra").await.expect_err("exhausted");
    assert_eq!(err.code().as_str(), "POOL_EXHAUSTED");
    assert_eq!(gate.entered.load(Ordering::SeqCst), 2);

    gate.open.notify_waiters();
    for r in join_all(in_flight).await {
        assert_eq!(r.unwrap().unwrap().status, 204);
    }
    assert_eq!(client.pool().current_usage(), 0);
}

#[tokio::test]
async fn cancelled_request_returns_its_connection() {
    let registry = Arc::new(MetricRegistry::new());
    let gate = Arc::new(Gate {
        open: Notify::new(),
        entered: AtomicUsize::new(0),
    });
    let cfg = PoolConfig::with_capacity(1);
    let client = HttpClient::from_config(&cfg, Arc::clone(&registry), gate).unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_millis(20), client.request("rg-slow")).await;
    assert!(cancelled.is_err());
    assert_eq!(client.pool().current_usage(), 0);
    assert_eq!(registry.snapshot(ACTIVE_CONNECTIONS, &[]), Some(0.0));
}

#[tokio::test]
async fn client_built_from_yaml_carries_pool_tags() {
    let cfg = config::load_from_str(
        r#"
version: 1
pool:
  name: "myConnectionProvider"
  capacity: 100
  tags: { additionalTag: "yes" }
"#,
    )
    .unwrap();

    let registry = Arc::new(MetricRegistry::new());
    let client = HttpClient::from_config(&cfg.pool, Arc::clone(&registry), lookup()).unwrap();
    assert_eq!(client.pool().name(), "myConnectionProvider");

    client.request("rg-xiaofei").await.unwrap();

    let tags = [("additionalTag", "yes")];
    let check = MetricsAssertions::new(&registry);
    check.expect_gauge_equals(MAX_CONNECTIONS, &tags, 100.0, 0.0).unwrap();
    check
        .expect_counter_equals(
            REQUESTS_TOTAL,
            &[("additionalTag", "yes"), ("outcome", "success")],
            1.0,
            0.0,
        )
        .unwrap();
    assert_eq!(registry.snapshot(REQUEST_DURATION, &tags), Some(1.0));
}
