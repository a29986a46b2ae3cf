#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use poolmeter_core::metrics::{LoggingExporter, MetricsSnapshot, Sample};
use poolmeter_core::{MetricId, MetricKind, MetricRegistry, MetricsExporter, Observation};

#[derive(Default)]
struct RecordingExporter {
    pushed: Mutex<Vec<MetricsSnapshot>>,
    closes: AtomicUsize,
}

impl MetricsExporter for RecordingExporter {
    fn name(&self) -> &str {
        "recording"
    }

    fn push(&self, snapshot: &MetricsSnapshot) {
        self.pushed.lock().unwrap().push(snapshot.clone());
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn same_kind_registration_returns_existing_handle() {
    let reg = MetricRegistry::new();
    let a = reg.gauge("active_connections", &[("pool", "p")]).unwrap();
    let b = reg.gauge("active_connections", &[("pool", "p")]).unwrap();

    reg.record_gauge(&a, 7.0).unwrap();
    assert_eq!(b.value(), 7.0);
    assert_eq!(reg.len(), 1);
}

#[test]
fn different_kind_is_duplicate() {
    let reg = MetricRegistry::new();
    reg.gauge("active_connections", &[]).unwrap();

    let err = reg.counter("active_connections", &[]).expect_err("must fail");
    assert_eq!(err.code().as_str(), "DUPLICATE_METRIC");

    // Different tags are a different identity.
    assert!(reg.counter("active_connections", &[("pool", "other")]).is_ok());
}

#[test]
fn increment_rejects_gauge_and_negative_delta() {
    let reg = MetricRegistry::new();
    let g = reg.gauge("g", &[]).unwrap();
    let c = reg.counter("c", &[]).unwrap();

    assert_eq!(reg.increment(&g, 1.0).unwrap_err().code().as_str(), "WRONG_METRIC_KIND");
    assert_eq!(reg.record_gauge(&c, 1.0).unwrap_err().code().as_str(), "WRONG_METRIC_KIND");
    assert_eq!(reg.increment(&c, -1.0).unwrap_err().code().as_str(), "INVALID_VALUE");
    assert_eq!(reg.record_gauge(&g, f64::NAN).unwrap_err().code().as_str(), "INVALID_VALUE");
}

#[test]
fn snapshot_of_unregistered_metric_is_none() {
    let reg = MetricRegistry::new();
    assert_eq!(reg.snapshot("nope", &[]), None);

    reg.gauge("g", &[("a", "1")]).unwrap();
    assert_eq!(reg.snapshot("g", &[]), None);
    assert_eq!(reg.snapshot("g", &[("a", "1")]), Some(0.0));
}

#[test]
fn concurrent_increments_sum_exactly() {
    let reg = Arc::new(MetricRegistry::new());
    let c = reg.counter("requests_total", &[]).unwrap();

    std::thread::scope(|s| {
        for t in 0..8 {
            let reg = Arc::clone(&reg);
            let c = c.clone();
            s.spawn(move || {
                for i in 0..1_000 {
                    reg.increment(&c, ((t + i) % 3) as f64).unwrap();
                }
            });
        }
    });

    let expected: f64 = (0..8)
        .flat_map(|t| (0..1_000).map(move |i| ((t + i) % 3) as f64))
        .sum();
    assert_eq!(reg.snapshot("requests_total", &[]), Some(expected));
}

#[test]
fn concurrent_gauge_writes_keep_a_written_value() {
    let reg = Arc::new(MetricRegistry::new());
    let g = reg.gauge("level", &[]).unwrap();

    std::thread::scope(|s| {
        for t in 1..=4 {
            let reg = Arc::clone(&reg);
            let g = g.clone();
            s.spawn(move || {
                for _ in 0..500 {
                    reg.record_gauge(&g, t as f64 * 1.25).unwrap();
                }
            });
        }
    });

    let v = reg.snapshot("level", &[]).unwrap();
    assert!([1.25, 2.5, 3.75, 5.0].contains(&v), "torn value {v}");
}

#[test]
fn observations_apply_by_kind() {
    let reg = MetricRegistry::new();
    reg.counter("bytes_total", &[]).unwrap();
    reg.gauge("level", &[]).unwrap();
    reg.histogram("latency", &[]).unwrap();

    reg.record(&Observation::new(MetricId::new("bytes_total", &[]), 10.0)).unwrap();
    reg.record(&Observation::new(MetricId::new("bytes_total", &[]), 5.0)).unwrap();
    reg.record(&Observation::new(MetricId::new("level", &[]), 3.0)).unwrap();
    reg.record(&Observation::new(MetricId::new("latency", &[]), 0.002)).unwrap();

    assert_eq!(reg.snapshot("bytes_total", &[]), Some(15.0));
    assert_eq!(reg.snapshot("level", &[]), Some(3.0));
    assert_eq!(reg.snapshot("latency", &[]), Some(1.0));

    let err = reg
        .record(&Observation::new(MetricId::new("missing", &[]), 1.0))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "UNKNOWN_METRIC");

    let err = reg
        .record(&Observation::new(MetricId::new("latency", &[]), -1.0))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_VALUE");
}

#[test]
fn histogram_snapshot_in_export() {
    let reg = MetricRegistry::new();
    let h = reg.histogram("latency", &[("op", "get")]).unwrap();
    reg.observe(&h, Duration::from_micros(300)).unwrap();
    reg.observe(&h, Duration::from_millis(20)).unwrap();

    let snap = reg.snapshot_all();
    let Some(Sample::Histogram(hs)) = snap.get(&MetricId::new("latency", &[("op", "get")])) else {
        panic!("histogram missing");
    };
    assert_eq!(hs.count, 2);
    assert_eq!(hs.sum_micros, 20_300);

    let text = reg.render_prometheus();
    assert!(text.contains("# TYPE latency histogram"));
    assert!(text.contains("latency_bucket{op=\"get\",le=\"500\"} 1"));
    assert!(text.contains("latency_bucket{op=\"get\",le=\"+Inf\"} 2"));
    assert!(text.contains("latency_count{op=\"get\"} 2"));
}

#[test]
fn close_flushes_once_and_is_idempotent() {
    let reg = MetricRegistry::new();
    let exporter = Arc::new(RecordingExporter::default());
    reg.add_exporter(exporter.clone());
    reg.add_exporter(Arc::new(LoggingExporter::new()));

    let g = reg.gauge("active_connections", &[]).unwrap();
    reg.record_gauge(&g, 4.0).unwrap();
    reg.export();

    reg.close();
    reg.close();

    assert!(reg.is_closed());
    assert_eq!(exporter.closes.load(Ordering::SeqCst), 1);
    let pushed = exporter.pushed.lock().unwrap();
    assert_eq!(pushed.len(), 2);
    assert_eq!(pushed[1].value("active_connections", &[]), Some(4.0));
    drop(pushed);

    // Nothing more is exported after close; values stay readable.
    reg.record_gauge(&g, 5.0).unwrap();
    reg.export();
    assert_eq!(exporter.pushed.lock().unwrap().len(), 2);
    assert_eq!(reg.snapshot("active_connections", &[]), Some(5.0));
}

#[test]
fn exporter_added_after_close_is_closed() {
    let reg = MetricRegistry::new();
    reg.close();

    let exporter = Arc::new(RecordingExporter::default());
    reg.add_exporter(exporter.clone());
    assert_eq!(exporter.closes.load(Ordering::SeqCst), 1);
    assert!(exporter.pushed.lock().unwrap().is_empty());
    assert_eq!(reg.exporter_count(), 0);
}

/// Logs the end of every push and every close, stalling the first push.
struct SlowFirstPush {
    entered: Mutex<mpsc::Sender<()>>,
    events: Mutex<Vec<&'static str>>,
    pushes: AtomicUsize,
}

impl MetricsExporter for SlowFirstPush {
    fn name(&self) -> &str {
        "slow"
    }

    fn push(&self, _snapshot: &MetricsSnapshot) {
        if self.pushes.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = self.entered.lock().unwrap().send(());
            thread::sleep(Duration::from_millis(50));
        }
        self.events.lock().unwrap().push("push");
    }

    fn close(&self) {
        self.events.lock().unwrap().push("close");
    }
}

#[test]
fn close_waits_for_in_flight_export() {
    let reg = Arc::new(MetricRegistry::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let exporter = Arc::new(SlowFirstPush {
        entered: Mutex::new(entered_tx),
        events: Mutex::new(Vec::new()),
        pushes: AtomicUsize::new(0),
    });
    reg.add_exporter(exporter.clone());
    assert_eq!(reg.exporter_count(), 1);

    let ticking = {
        let reg = Arc::clone(&reg);
        thread::spawn(move || reg.export())
    };
    entered_rx.recv().unwrap();
    reg.close();
    ticking.join().unwrap();

    assert_eq!(*exporter.events.lock().unwrap(), vec!["push", "push", "close"]);
}

#[test]
fn handle_reports_kind() {
    let reg = MetricRegistry::new();
    let h = reg.register("x", &[], MetricKind::Histogram).unwrap();
    assert_eq!(h.kind(), MetricKind::Histogram);
    assert_eq!(h.id().name(), "x");
}
