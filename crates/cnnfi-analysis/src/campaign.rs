//! Campaign result aggregate

use crate::classifier::{CampaignClassifier, LabelTransition, OutcomeCounts, SamplePair};
use crate::degradation::{DegradationTable, MetricsComparator, MetricsSet};
use crate::error::Result;
use crate::response::{CampaignResponse, NumericFaultDetail, ServiceComparison};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetadata {
    pub generated_at: DateTime<Utc>,
    pub num_classes: u32,
    pub golden_samples: usize,
    pub faulty_samples: usize,
    /// Samples present in both streams
    pub compared_samples: usize,
}

/// Everything derived from one campaign response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignResult {
    pub metadata: CampaignMetadata,
    pub counts: OutcomeCounts,
    pub pairs: Vec<SamplePair>,
    pub transitions: Vec<LabelTransition>,
    pub golden_metrics: MetricsSet,
    pub faulty_metrics: MetricsSet,
    pub degradation: DegradationTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_fault: Option<NumericFaultDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_comparison: Option<ServiceComparison>,
}

impl CampaignResult {
    pub fn sdc_rate(&self) -> f64 {
        self.counts.sdc_rate()
    }

    pub fn masked_rate(&self) -> f64 {
        self.counts.masked_rate()
    }
}

/// Turns campaign responses into [`CampaignResult`]s
#[derive(Debug, Clone, Default)]
pub struct CampaignAnalyzer {
    classifier: CampaignClassifier,
    comparator: MetricsComparator,
}

impl CampaignAnalyzer {
    pub fn new(classifier: CampaignClassifier, comparator: MetricsComparator) -> Self {
        Self {
            classifier,
            comparator,
        }
    }

    /// Classify predictions and compare metrics. A relayed numeric fault is
    /// carried into the result.
    pub fn analyze(&self, response: &CampaignResponse) -> CampaignResult {
        let golden = response.golden_results.labels();
        let faulty = response.fault_results.labels();
        let classification = self.classifier.classify(&golden, &faulty);
        let degradation = self.comparator.compare(
            &response.golden_results.metrics,
            &response.fault_results.metrics,
        );

        let numeric_fault = response.numeric_fault().cloned();
        if let Some(detail) = &numeric_fault {
            log::warn!("Inference engine reported a numeric fault: {}", detail);
        }
        log::info!(
            "Campaign analysed: {} valid samples, SDC rate {:.4}",
            classification.counts.total_valid,
            classification.counts.sdc_rate()
        );

        CampaignResult {
            metadata: CampaignMetadata {
                generated_at: Utc::now(),
                num_classes: self.classifier.num_classes(),
                golden_samples: golden.len(),
                faulty_samples: faulty.len(),
                compared_samples: classification.pairs.len(),
            },
            counts: classification.counts,
            pairs: classification.pairs,
            transitions: classification.transitions,
            golden_metrics: response.golden_results.metrics.clone(),
            faulty_metrics: response.fault_results.metrics.clone(),
            degradation,
            numeric_fault,
            service_comparison: response.comparison.clone(),
        }
    }

    /// Like [`analyze`](Self::analyze), but a relayed numeric fault is an
    /// error
    pub fn analyze_strict(&self, response: &CampaignResponse) -> Result<CampaignResult> {
        response.check_numeric()?;
        Ok(self.analyze(response))
    }
}
