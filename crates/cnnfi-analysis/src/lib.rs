//! Fault campaign analysis
//!
//! Classifies the outcome of a fault-injection campaign by comparing golden
//! and faulty predictions sample by sample (SDC vs fault masked), and measures
//! how much each aggregate metric degraded.

pub mod campaign;
pub mod classifier;
pub mod degradation;
pub mod error;
pub mod report;
pub mod response;

pub use campaign::{CampaignAnalyzer, CampaignMetadata, CampaignResult};
pub use classifier::{
    CampaignClassifier, Classification, LabelTransition, Outcome, OutcomeCounts,
    PredictionSample, SamplePair, DEFAULT_NUM_CLASSES,
};
pub use degradation::{
    compare_metrics, DegradationTable, MetricDelta, MetricsComparator, MetricsSet,
    DEFAULT_EXCLUDED_METRICS,
};
pub use error::{AnalysisError, Result};
pub use report::format_campaign_report;
pub use response::{CampaignResponse, NumericFaultDetail, RunResults, ServiceComparison};
