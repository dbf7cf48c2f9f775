//! Integration tests for campaign analysis

use cnnfi_analysis::{
    compare_metrics, format_campaign_report, AnalysisError, CampaignAnalyzer, CampaignClassifier,
    CampaignResponse, MetricsComparator, MetricsSet,
};

#[test]
fn test_reference_campaign() {
    let classifier = CampaignClassifier::default();
    let golden = [Some(3), Some(3), Some(7), Some(2)];
    let faulty = [Some(3), Some(5), Some(7), Some(-1)];
    let result = classifier.classify(&golden, &faulty);

    assert_eq!(result.counts.fault_masked, 2);
    assert_eq!(result.counts.sdc, 1);
    assert_eq!(result.counts.total_valid, 3);
    assert!((result.counts.sdc_rate() - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_classification_is_deterministic() {
    let classifier = CampaignClassifier::default();
    let golden: Vec<Option<i64>> = (0..200).map(|i| Some(i % 10)).collect();
    let faulty: Vec<Option<i64>> = (0..200)
        .map(|i| if i % 7 == 0 { None } else { Some((i * 3) % 10) })
        .collect();

    let first = classifier.classify(&golden, &faulty);
    let second = classifier.classify(&golden, &faulty);
    assert_eq!(first, second);
    assert_eq!(
        first.counts.sdc + first.counts.fault_masked + first.counts.invalid,
        200
    );
}

#[test]
fn test_full_metric_set() {
    let golden: MetricsSet = serde_json::from_str(
        r#"{"accuracy": 0.95, "precision": 0.94, "recall": 0.93, "f1_score": 0.935, "loss": 0.12, "num_samples": 100}"#,
    )
    .unwrap();
    let faulty: MetricsSet = serde_json::from_str(
        r#"{"accuracy": 0.80, "precision": 0.79, "recall": 0.78, "f1_score": 0.785, "loss": 0.95, "num_samples": 100}"#,
    )
    .unwrap();

    let table = compare_metrics(&golden, &faulty);
    assert_eq!(table.len(), 5);
    assert!(!table.contains_key("num_samples"));
    assert!((table["accuracy"].degradation_pct.unwrap() - 15.79).abs() < 0.01);

    let everything = MetricsComparator::with_excluded(Vec::<String>::new());
    assert_eq!(everything.compare(&golden, &faulty).len(), 6);
}

#[test]
fn test_crashed_campaign_end_to_end() {
    let response = CampaignResponse::from_json(
        r#"{
            "results": {
                "golden_results": {"predictions": [0, 1, 2], "metrics": {"accuracy": 1.0}},
                "fault_results": {
                    "predictions": [-1, -1, -1],
                    "metrics": {"accuracy": 0.0},
                    "numeric_error": {"overflow_count": 5, "underflow_count": 1, "nan_count": 9}
                }
            }
        }"#,
    )
    .unwrap();

    let analyzer = CampaignAnalyzer::default();
    let result = analyzer.analyze(&response);
    assert_eq!(result.counts.total_valid, 0);
    assert_eq!(result.counts.invalid, 3);
    assert_eq!(result.sdc_rate(), 0.0);
    assert_eq!(result.degradation["accuracy"].degradation_pct, Some(100.0));

    let report = format_campaign_report(&result);
    assert!(report.contains("Numeric Fault"));
    assert!(report.contains("NaN:       9"));

    assert!(matches!(
        analyzer.analyze_strict(&response),
        Err(AnalysisError::NumericOverflow(detail)) if detail.overflow_count == 5
    ));
}

#[test]
fn test_result_json_shape() {
    let response = CampaignResponse::from_json(
        r#"{"golden_results": {"predictions": [4]}, "fault_results": {"predictions": [9]}}"#,
    )
    .unwrap();
    let result = CampaignAnalyzer::default().analyze(&response);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["counts"]["sdc"], 1);
    assert_eq!(json["pairs"][0]["outcome"], "sdc");
    assert_eq!(json["transitions"][0]["faulty"], 9);
    assert!(json["metadata"]["generated_at"].is_string());
}
