//! End-to-end tests for the cnnfi command line

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn cnnfi(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cnnfi"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run cnnfi")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_init_then_refuse_overwrite() {
    let dir = tempfile::tempdir().unwrap();

    let output = cnnfi(dir.path(), &["init"]);
    assert!(output.status.success());
    let manifest = fs::read_to_string(dir.path().join("cnnfi.toml")).unwrap();
    assert!(manifest.contains("lenet5-mnist"));
    assert!(manifest.contains("FMAP_1"));

    let output = cnnfi(dir.path(), &["init"]);
    assert!(!output.status.success());

    let output = cnnfi(dir.path(), &["init", "--force"]);
    assert!(output.status.success());
}

#[test]
fn test_bits_command() {
    let dir = tempfile::tempdir().unwrap();

    let output = cnnfi(dir.path(), &["bits", "31"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Hardware index (MSB-first): 0"));
    assert!(text.contains("sign"));

    let output = cnnfi(dir.path(), &["bits", "8", "--width", "8"]);
    assert!(!output.status.success());
}

#[test]
fn test_validate_weight_request() {
    let dir = tempfile::tempdir().unwrap();
    let request = dir.path().join("weights.json");
    fs::write(
        &request,
        r#"{
            "enabled": true,
            "layers": {
                "conv2d_1": {"target_type": "kernel", "positions": [[0, 0, 0, 0], [4, 4, 0, 5]], "bit_positions": [30]}
            }
        }"#,
    )
    .unwrap();

    let output = cnnfi(
        dir.path(),
        &["validate", "weights.json", "--domain", "weight", "-o", "normalized.json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("2 position(s)"));

    let normalized: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("normalized.json")).unwrap())
            .unwrap();
    assert_eq!(
        normalized["layers"]["conv2d_1"]["positions"][1]["position"],
        serde_json::json!([4, 4, 0, 5])
    );
}

#[test]
fn test_validate_rejects_out_of_range_rate() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("activations.json"),
        r#"{"enabled": true, "layers": {"conv2d_1": {"fault_type": "bit_flip", "fault_rate": 2.0}}}"#,
    )
    .unwrap();

    let output = cnnfi(dir.path(), &["validate", "activations.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("fault rate"));
}

#[test]
fn test_hardware_request() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("faults.json"),
        r#"{
            "filter_faults": [{"filter_name": "FMAP_1", "row": 0, "col": 0, "bit_position": 0, "fault_type": "bitflip"}],
            "bias_faults": []
        }"#,
    )
    .unwrap();

    let output = cnnfi(dir.path(), &["hardware", "faults.json"]);
    assert!(output.status.success());
    let request: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(request["filter_faults"][0]["bit_position"], 7);

    let output = cnnfi(dir.path(), &["hardware", "faults.json", "--numbering", "msb"]);
    let request: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(request["filter_faults"][0]["bit_position"], 0);
}

#[test]
fn test_analyze_report_and_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("response.json"),
        r#"{
            "results": {
                "golden_results": {"predictions": [3, 3, 7, 2], "metrics": {"accuracy": 0.95}},
                "fault_results": {"predictions": [3, 5, 7, -1], "metrics": {"accuracy": 0.80}}
            }
        }"#,
    )
    .unwrap();

    let output = cnnfi(dir.path(), &["analyze", "response.json"]);
    assert!(output.status.success());
    let report = stdout(&output);
    assert!(report.contains("(33.33%)"));
    assert!(report.contains("15.79%"));

    let output = cnnfi(dir.path(), &["analyze", "response.json", "--json"]);
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["counts"]["total_valid"], 3);
}
