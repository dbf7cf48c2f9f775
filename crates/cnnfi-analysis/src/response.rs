//! Campaign result payloads returned by the inference service

use crate::degradation::MetricsSet;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Numeric trouble reported by the inference engine for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericFaultDetail {
    #[serde(default)]
    pub overflow_count: u64,
    #[serde(default)]
    pub underflow_count: u64,
    #[serde(default)]
    pub nan_count: u64,
    /// Prediction produced despite the fault; not trustworthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_prediction: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for NumericFaultDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} overflow, {} underflow, {} NaN",
            self.overflow_count, self.underflow_count, self.nan_count
        )?;
        if let Some(prediction) = self.attempted_prediction {
            write!(f, " (attempted prediction {})", prediction)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Predictions and metrics of one run (golden or faulty)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    /// Raw labels; anything that is not an integer is an invalid prediction
    #[serde(default)]
    pub predictions: Vec<Value>,
    #[serde(default)]
    pub metrics: MetricsSet,
    #[serde(default, alias = "numeric_error", skip_serializing_if = "Option::is_none")]
    pub numeric_fault: Option<NumericFaultDetail>,
}

impl RunResults {
    /// Predictions as integer labels; nulls, strings and fractional numbers
    /// become `None`
    pub fn labels(&self) -> Vec<Option<i64>> {
        self.predictions.iter().map(label_of).collect()
    }
}

fn label_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Summary comparison computed by the service itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceComparison {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_with_same_predictions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples_with_different_predictions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_different: Option<f64>,
}

/// Campaign response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignResponse {
    pub golden_results: RunResults,
    pub fault_results: RunResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ServiceComparison>,
}

impl CampaignResponse {
    /// Parse a response, accepting both the bare body and one wrapped as
    /// `{"results": {...}}`
    pub fn from_value(mut value: Value) -> Result<Self> {
        if value.get("results").is_some_and(Value::is_object) {
            value = value["results"].take();
        }
        for field in ["golden_results", "fault_results"] {
            if value.get(field).map_or(true, Value::is_null) {
                return Err(AnalysisError::MissingResults(field));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(s)?)
    }

    /// Numeric fault of the faulty run, falling back to the golden run
    pub fn numeric_fault(&self) -> Option<&NumericFaultDetail> {
        self.fault_results
            .numeric_fault
            .as_ref()
            .or(self.golden_results.numeric_fault.as_ref())
    }

    /// Fail if the engine reported a numeric fault
    pub fn check_numeric(&self) -> Result<()> {
        match self.numeric_fault() {
            Some(detail) => Err(AnalysisError::NumericOverflow(detail.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_unwrapped() {
        let body = json!({
            "golden_results": {"predictions": [1, 2], "metrics": {"accuracy": 1.0}},
            "fault_results": {"predictions": [1, 3], "metrics": {"accuracy": 0.5}}
        });
        let wrapped = json!({"results": body.clone()});

        let bare = CampaignResponse::from_value(body).unwrap();
        let unwrapped = CampaignResponse::from_value(wrapped).unwrap();
        assert_eq!(bare, unwrapped);
        assert!(bare.comparison.is_none());
    }

    #[test]
    fn test_missing_results_block() {
        let err = CampaignResponse::from_value(json!({"golden_results": {}})).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingResults("fault_results")));
    }

    #[test]
    fn test_prediction_labels() {
        let run: RunResults =
            serde_json::from_value(json!({"predictions": [3, null, "7", 2.0, 2.5, -1]})).unwrap();
        assert_eq!(
            run.labels(),
            vec![Some(3), None, None, Some(2), None, Some(-1)]
        );
    }

    #[test]
    fn test_numeric_error_alias() {
        let response = CampaignResponse::from_json(
            r#"{
                "golden_results": {"predictions": [1]},
                "fault_results": {
                    "predictions": [null],
                    "numeric_error": {"overflow_count": 12, "nan_count": 3, "attempted_prediction": 4}
                }
            }"#,
        )
        .unwrap();
        let detail = response.numeric_fault().unwrap();
        assert_eq!(detail.overflow_count, 12);
        assert_eq!(detail.underflow_count, 0);
        assert_eq!(detail.to_string(), "12 overflow, 0 underflow, 3 NaN (attempted prediction 4)");
        assert!(matches!(
            response.check_numeric(),
            Err(AnalysisError::NumericOverflow(_))
        ));
    }
}
