//! SDC / fault-masked classification
//!
//! Each sample the golden and faulty runs have in common is classified by
//! comparing the two predicted labels. Samples whose faulty prediction is
//! missing or outside the label range (a crash, a null, a `-1` marker) are
//! counted as invalid and take no part in the rates.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label count of the MNIST classifier
pub const DEFAULT_NUM_CLASSES: u32 = 10;

/// A single prediction, checked against the label range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSample {
    Label(u32),
    Invalid,
}

impl PredictionSample {
    pub fn from_raw(raw: Option<i64>, num_classes: u32) -> Self {
        match raw {
            Some(label) if (0..i64::from(num_classes)).contains(&label) => {
                PredictionSample::Label(label as u32)
            }
            _ => PredictionSample::Invalid,
        }
    }

    pub fn label(&self) -> Option<u32> {
        match self {
            PredictionSample::Label(label) => Some(*label),
            PredictionSample::Invalid => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, PredictionSample::Label(_))
    }
}

/// Result of one golden/faulty comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Prediction changed without any error being raised
    Sdc,
    /// Prediction unchanged
    FaultMasked,
    /// Faulty prediction unusable; not counted
    Invalid,
}

impl Outcome {
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Sdc => "SDC",
            Outcome::FaultMasked => "Fault Masked",
            Outcome::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One compared sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePair {
    pub index: usize,
    pub golden: Option<i64>,
    pub faulty: Option<i64>,
    pub outcome: Outcome,
}

/// Aggregate outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub sdc: u64,
    pub fault_masked: u64,
    /// `sdc + fault_masked`
    pub total_valid: u64,
    /// Compared samples excluded for an unusable faulty prediction
    pub invalid: u64,
}

impl OutcomeCounts {
    /// Fraction of valid samples with the given outcome; 0 when nothing was
    /// valid
    pub fn rate(&self, outcome: Outcome) -> f64 {
        let count = match outcome {
            Outcome::Sdc => self.sdc,
            Outcome::FaultMasked => self.fault_masked,
            Outcome::Invalid => return 0.0,
        };
        if self.total_valid == 0 {
            0.0
        } else {
            count as f64 / self.total_valid as f64
        }
    }

    pub fn sdc_rate(&self) -> f64 {
        self.rate(Outcome::Sdc)
    }

    pub fn masked_rate(&self) -> f64 {
        self.rate(Outcome::FaultMasked)
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sdc => self.sdc += 1,
            Outcome::FaultMasked => self.fault_masked += 1,
            Outcome::Invalid => self.invalid += 1,
        }
        self.total_valid = self.sdc + self.fault_masked;
    }
}

/// Number of SDC samples that moved from one label to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTransition {
    pub golden: Option<i64>,
    pub faulty: i64,
    pub count: u64,
}

/// Full classification of a campaign
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub counts: OutcomeCounts,
    pub pairs: Vec<SamplePair>,
    /// SDC label transitions, most frequent first
    pub transitions: Vec<LabelTransition>,
}

/// Classifies paired golden/faulty predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignClassifier {
    num_classes: u32,
}

impl Default for CampaignClassifier {
    fn default() -> Self {
        Self {
            num_classes: DEFAULT_NUM_CLASSES,
        }
    }
}

impl CampaignClassifier {
    pub fn new(num_classes: u32) -> Result<Self> {
        if num_classes == 0 {
            return Err(AnalysisError::InvalidNumClasses(num_classes));
        }
        Ok(Self { num_classes })
    }

    pub fn num_classes(&self) -> u32 {
        self.num_classes
    }

    /// Classify a single pair. The golden label is compared as given; only
    /// the faulty label gates validity.
    pub fn outcome(&self, golden: Option<i64>, faulty: Option<i64>) -> Outcome {
        if !PredictionSample::from_raw(faulty, self.num_classes).is_valid() {
            Outcome::Invalid
        } else if golden == faulty {
            Outcome::FaultMasked
        } else {
            Outcome::Sdc
        }
    }

    /// Classify the first `min(golden.len(), faulty.len())` samples
    pub fn classify(&self, golden: &[Option<i64>], faulty: &[Option<i64>]) -> Classification {
        if golden.len() != faulty.len() {
            log::warn!(
                "Prediction streams differ in length (golden {}, faulty {}); comparing the first {}",
                golden.len(),
                faulty.len(),
                golden.len().min(faulty.len())
            );
        }

        let mut counts = OutcomeCounts::default();
        let mut transitions: BTreeMap<(Option<i64>, i64), u64> = BTreeMap::new();
        let pairs: Vec<SamplePair> = golden
            .iter()
            .zip(faulty)
            .enumerate()
            .map(|(index, (&g, &f))| {
                let outcome = self.outcome(g, f);
                counts.record(outcome);
                if let (Outcome::Sdc, Some(f)) = (outcome, f) {
                    *transitions.entry((g, f)).or_insert(0) += 1;
                }
                SamplePair {
                    index,
                    golden: g,
                    faulty: f,
                    outcome,
                }
            })
            .collect();

        let mut transitions: Vec<LabelTransition> = transitions
            .into_iter()
            .map(|((golden, faulty), count)| LabelTransition {
                golden,
                faulty,
                count,
            })
            .collect();
        // Stable sort keeps label order among equal counts
        transitions.sort_by(|a, b| b.count.cmp(&a.count));

        log::debug!(
            "Classified {} samples: {} SDC, {} masked, {} invalid",
            pairs.len(),
            counts.sdc,
            counts.fault_masked,
            counts.invalid
        );

        Classification {
            counts,
            pairs,
            transitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[i64]) -> Vec<Option<i64>> {
        raw.iter().map(|&l| Some(l)).collect()
    }

    #[test]
    fn test_mixed_campaign() {
        let classifier = CampaignClassifier::default();
        let result = classifier.classify(&labels(&[3, 3, 7, 2]), &labels(&[3, 5, 7, -1]));

        assert_eq!(result.counts.fault_masked, 2);
        assert_eq!(result.counts.sdc, 1);
        assert_eq!(result.counts.total_valid, 3);
        assert_eq!(result.counts.invalid, 1);
        assert!((result.counts.sdc_rate() - 1.0 / 3.0).abs() < 1e-12);
        assert!((result.counts.masked_rate() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.pairs[3].outcome, Outcome::Invalid);
        assert_eq!(
            result.transitions,
            vec![LabelTransition {
                golden: Some(3),
                faulty: 5,
                count: 1
            }]
        );
    }

    #[test]
    fn test_all_invalid_campaign() {
        let classifier = CampaignClassifier::default();
        let result = classifier.classify(&labels(&[1, 2, 3]), &[None, Some(-1), Some(10)]);

        assert_eq!(result.counts.total_valid, 0);
        assert_eq!(result.counts.invalid, 3);
        assert_eq!(result.counts.sdc_rate(), 0.0);
        assert_eq!(result.counts.masked_rate(), 0.0);
    }

    #[test]
    fn test_length_mismatch_uses_shorter_stream() {
        let classifier = CampaignClassifier::default();
        let result = classifier.classify(&labels(&[1, 2, 3, 4, 5]), &labels(&[1, 9]));
        assert_eq!(result.pairs.len(), 2);
        assert_eq!(result.counts.total_valid, 2);

        let result = classifier.classify(&[], &labels(&[1]));
        assert!(result.pairs.is_empty());
    }

    #[test]
    fn test_invalid_golden_counts_as_sdc() {
        let classifier = CampaignClassifier::default();
        assert_eq!(classifier.outcome(None, Some(4)), Outcome::Sdc);
        assert_eq!(classifier.outcome(Some(4), None), Outcome::Invalid);
    }

    #[test]
    fn test_num_classes_bounds_validity() {
        let binary = CampaignClassifier::new(2).unwrap();
        assert_eq!(binary.outcome(Some(1), Some(2)), Outcome::Invalid);
        assert!(CampaignClassifier::new(0).is_err());
        assert_eq!(PredictionSample::from_raw(Some(9), 10), PredictionSample::Label(9));
        assert_eq!(PredictionSample::from_raw(Some(10), 10), PredictionSample::Invalid);
    }

    #[test]
    fn test_transitions_sorted_by_count() {
        let classifier = CampaignClassifier::default();
        let result = classifier.classify(&labels(&[1, 1, 2, 2, 2]), &labels(&[7, 7, 8, 8, 8]));
        assert_eq!(result.transitions[0].golden, Some(2));
        assert_eq!(result.transitions[0].count, 3);
        assert_eq!(result.transitions[1].count, 2);
    }
}
