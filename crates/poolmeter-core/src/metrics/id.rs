use std::fmt;

/// Metric kind. Fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    /// Monotonically accumulating sum.
    Counter,
    /// Instantaneous value that can go up or down.
    Gauge,
    /// Latency distribution over fixed microsecond buckets.
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric identity: name plus a tag set.
///
/// Tags are flattened into a sorted vector so `{a=1,b=2}` and `{b=2,a=1}`
/// resolve to the same metric. When a key repeats, the last value wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    name: String,
    tags: Vec<(String, String)>,
}

impl MetricId {
    pub fn new(name: impl Into<String>, tags: &[(&str, &str)]) -> Self {
        Self::from_owned(
            name,
            tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    pub fn from_owned(name: impl Into<String>, tags: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            tags: normalize(tags),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }
}

fn normalize(tags: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::with_capacity(tags.len());
    for (k, v) in tags {
        match out.iter_mut().find(|(existing, _)| *existing == k) {
            Some(slot) => slot.1 = v,
            None => out.push((k, v)),
        }
    }
    out.sort();
    out
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}
