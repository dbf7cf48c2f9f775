//! Golden vs faulty metric degradation

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metric name to value, as reported by the inference service
pub type MetricsSet = IndexMap<String, Value>;

/// Per-metric degradation, in golden-set order
pub type DegradationTable = IndexMap<String, MetricDelta>;

/// Sample-count fields that are not quality metrics
pub const DEFAULT_EXCLUDED_METRICS: &[&str] = &[
    "num_samples",
    "total_samples",
    "samples",
    "correct_predictions",
    "support",
];

/// Change of one metric between golden and faulty runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub golden: f64,
    pub faulty: f64,
    /// `golden - faulty`; positive means the fault made things worse for
    /// higher-is-better metrics
    pub degradation: f64,
    /// Relative degradation in percent; `None` when the golden value is 0
    pub degradation_pct: Option<f64>,
}

impl MetricDelta {
    pub fn new(golden: f64, faulty: f64) -> Self {
        let degradation = golden - faulty;
        let degradation_pct = (golden != 0.0).then(|| degradation / golden * 100.0);
        Self {
            golden,
            faulty,
            degradation,
            degradation_pct,
        }
    }
}

/// Compares two metric sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsComparator {
    excluded: Vec<String>,
}

impl Default for MetricsComparator {
    fn default() -> Self {
        Self::with_excluded(DEFAULT_EXCLUDED_METRICS.iter().copied())
    }
}

impl MetricsComparator {
    pub fn with_excluded<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` names a sample count rather than a metric
    pub fn is_excluded(&self, key: &str) -> bool {
        key.ends_with("_count") || self.excluded.iter().any(|e| e == key)
    }

    /// Degradation of every numeric metric present in both sets
    pub fn compare(&self, golden: &MetricsSet, faulty: &MetricsSet) -> DegradationTable {
        let mut table = DegradationTable::new();
        for (key, golden_value) in golden {
            if self.is_excluded(key) {
                continue;
            }
            let Some(faulty_value) = faulty.get(key) else {
                log::debug!("Metric '{}' missing from faulty results", key);
                continue;
            };
            match (golden_value.as_f64(), faulty_value.as_f64()) {
                (Some(g), Some(f)) => {
                    table.insert(key.clone(), MetricDelta::new(g, f));
                }
                _ => log::debug!("Skipping non-numeric metric '{}'", key),
            }
        }
        table
    }
}

/// Compare with the default exclusions
pub fn compare_metrics(golden: &MetricsSet, faulty: &MetricsSet) -> DegradationTable {
    MetricsComparator::default().compare(golden, faulty)
}
