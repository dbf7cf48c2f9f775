//! Text report for campaign results

use crate::campaign::CampaignResult;

/// Percentage with two decimals
fn pct(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// Format a campaign analysis report
pub fn format_campaign_report(result: &CampaignResult) -> String {
    let mut output = String::new();

    output.push_str("=== Fault Campaign Analysis Report ===\n\n");
    output.push_str(&format!(
        "Generated: {}\n",
        result.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "Samples: {} golden, {} faulty, {} compared\n\n",
        result.metadata.golden_samples,
        result.metadata.faulty_samples,
        result.metadata.compared_samples
    ));

    let counts = &result.counts;
    output.push_str("--- Fault Outcomes ---\n");
    output.push_str(&format!(
        "  SDC:          {:>6}  ({})\n",
        counts.sdc,
        pct(counts.sdc_rate())
    ));
    output.push_str(&format!(
        "  Fault Masked: {:>6}  ({})\n",
        counts.fault_masked,
        pct(counts.masked_rate())
    ));
    output.push_str(&format!("  Total valid:  {:>6}\n", counts.total_valid));
    if counts.invalid > 0 {
        output.push_str(&format!(
            "  Invalid:      {:>6}  (excluded from rates)\n",
            counts.invalid
        ));
    }
    output.push('\n');

    if !result.transitions.is_empty() {
        output.push_str("--- SDC Label Transitions ---\n");
        for t in &result.transitions {
            let golden = t
                .golden
                .map_or_else(|| "invalid".to_string(), |g| g.to_string());
            output.push_str(&format!("  {} -> {}: {}\n", golden, t.faulty, t.count));
        }
        output.push('\n');
    }

    if !result.degradation.is_empty() {
        output.push_str("--- Metrics Degradation ---\n");
        output.push_str(&format!(
            "  {:<20} {:>10} {:>10} {:>12} {:>10}\n",
            "Metric", "Golden", "Faulty", "Degradation", "Relative"
        ));
        for (name, delta) in &result.degradation {
            let relative = delta
                .degradation_pct
                .map_or_else(|| "n/a".to_string(), |p| format!("{:.2}%", p));
            output.push_str(&format!(
                "  {:<20} {:>10.4} {:>10.4} {:>12.4} {:>10}\n",
                name, delta.golden, delta.faulty, delta.degradation, relative
            ));
        }
        output.push('\n');
    }

    if let Some(comparison) = &result.service_comparison {
        output.push_str("--- Service Comparison ---\n");
        if let Some(same) = comparison.samples_with_same_predictions {
            output.push_str(&format!("  Same predictions:      {}\n", same));
        }
        if let Some(different) = comparison.samples_with_different_predictions {
            output.push_str(&format!("  Different predictions: {}\n", different));
        }
        if let Some(percentage) = comparison.percentage_different {
            output.push_str(&format!("  Percentage different:  {:.2}%\n", percentage));
        }
        output.push('\n');
    }

    if let Some(detail) = &result.numeric_fault {
        output.push_str("--- Numeric Fault ---\n");
        output.push_str(&format!("  Overflow:  {}\n", detail.overflow_count));
        output.push_str(&format!("  Underflow: {}\n", detail.underflow_count));
        output.push_str(&format!("  NaN:       {}\n", detail.nan_count));
        if let Some(prediction) = detail.attempted_prediction {
            output.push_str(&format!(
                "  Attempted prediction: {} (unreliable)\n",
                prediction
            ));
        }
        if let Some(message) = &detail.message {
            output.push_str(&format!("  Message: {}\n", message));
        }
    }

    output
}
