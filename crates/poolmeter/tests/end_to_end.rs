#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use poolmeter::client::obs::logging;
use poolmeter::client::pool::metrics::{ACTIVE_CONNECTIONS, MAX_CONNECTIONS};
use poolmeter::client::{config, HttpClient, PooledConnection, RemoteOperation, Response};
use poolmeter::core::metrics::LoggingExporter;
use poolmeter::core::{BoxError, MetricRegistry, MetricsAssertions};

struct GetResourceGroup;

#[async_trait]
impl RemoteOperation for GetResourceGroup {
    async fn perform(&self, target: &str, _conn: &PooledConnection) -> Result<Response, BoxError> {
        Ok(Response::new(200, format!("{{\"name\":\"{target}\",\"location\":\"eastus\"}}")))
    }
}

#[tokio::test]
async fn resource_group_lookup_through_metered_pool() {
    logging::init_tracing();

    let cfg = config::load_from_str(
        r#"
version: 1
pool:
  name: "myConnectionProvider"
  capacity: 100
  acquire_timeout_ms: 50
metrics:
  export_interval_ms: 1000
"#,
    )
    .unwrap();

    let registry = Arc::new(MetricRegistry::new());
    let exporter = Arc::new(LoggingExporter::new());
    registry.add_exporter(exporter.clone());

    let client =
        HttpClient::from_config(&cfg.pool, Arc::clone(&registry), Arc::new(GetResourceGroup))
            .unwrap();
    let resp = client.request("rg-xiaofei").await.unwrap();
    assert_eq!(resp.status, 200);

    let check = MetricsAssertions::new(&registry);
    check.expect_gauge_equals(MAX_CONNECTIONS, &[], 100.0, 0.0).unwrap();
    check.expect_gauge_equals(ACTIVE_CONNECTIONS, &[], 0.0, 0.0).unwrap();

    // Hold every connection: usage now matches the configured maximum.
    let mut held = Vec::new();
    for _ in 0..100 {
        held.push(client.pool().acquire(Duration::from_secs(1)).await.unwrap());
    }
    check.expect_gauge_equals(ACTIVE_CONNECTIONS, &[], 100.0, 0.0).unwrap();

    let err = client.request("rg-overflow").await.expect_err("pool is full");
    assert_eq!(err.code().as_str(), "POOL_EXHAUSTED");

    registry.close();
    assert_eq!(exporter.pushes(), 1);
}
