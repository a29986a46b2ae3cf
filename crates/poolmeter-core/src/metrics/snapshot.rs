use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::id::{MetricId, MetricKind};
use super::value::HistogramSnapshot;

/// One metric's value at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Counter(f64),
    Gauge(f64),
    Histogram(HistogramSnapshot),
}

impl Sample {
    pub fn kind(&self) -> MetricKind {
        match self {
            Sample::Counter(_) => MetricKind::Counter,
            Sample::Gauge(_) => MetricKind::Gauge,
            Sample::Histogram(_) => MetricKind::Histogram,
        }
    }

    /// Scalar view; histograms report their observation count.
    pub fn value(&self) -> f64 {
        match self {
            Sample::Counter(v) | Sample::Gauge(v) => *v,
            Sample::Histogram(h) => h.count as f64,
        }
    }
}

/// Ordered mapping of metric identity to value, as handed to exporters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    entries: BTreeMap<MetricId, Sample>,
}

impl MetricsSnapshot {
    pub(crate) fn insert(&mut self, id: MetricId, sample: Sample) {
        self.entries.insert(id, sample);
    }

    pub fn get(&self, id: &MetricId) -> Option<&Sample> {
        self.entries.get(id)
    }

    pub fn value(&self, name: &str, tags: &[(&str, &str)]) -> Option<f64> {
        self.get(&MetricId::new(name, tags)).map(Sample::value)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, MetricId, Sample> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render in Prometheus text exposition format.
    ///
    /// Entries sharing a name are adjacent (ordering is by name first), so one
    /// `# TYPE` line is emitted per name. Histogram bounds are in microseconds.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        let mut last_name: Option<&str> = None;

        for (id, sample) in &self.entries {
            if last_name != Some(id.name()) {
                let _ = writeln!(out, "# TYPE {} {}", id.name(), sample.kind());
                last_name = Some(id.name());
            }

            let label_str = id
                .tags()
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");

            match sample {
                Sample::Counter(v) | Sample::Gauge(v) => {
                    if label_str.is_empty() {
                        let _ = writeln!(out, "{} {}", id.name(), v);
                    } else {
                        let _ = writeln!(out, "{}{{{}}} {}", id.name(), label_str, v);
                    }
                }
                Sample::Histogram(h) => render_histogram(&mut out, id.name(), &label_str, h),
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a MetricsSnapshot {
    type Item = (&'a MetricId, &'a Sample);
    type IntoIter = btree_map::Iter<'a, MetricId, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn render_histogram(out: &mut String, name: &str, label_str: &str, h: &HistogramSnapshot) {
    let prefix = if label_str.is_empty() {
        String::new()
    } else {
        format!("{},", label_str)
    };

    for (le, count) in &h.buckets {
        let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
    }
    let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, h.count);
    let _ = writeln!(out, "{}_sum{{{}}} {}", name, label_str, h.sum_micros);
    let _ = writeln!(out, "{}_count{{{}}} {}", name, label_str, h.count);
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
