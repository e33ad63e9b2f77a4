//! CLI end-to-end tests for ct-core.
//!
//! Every test runs the real binary against artifacts written to a temp
//! directory and checks stdout payloads, stderr error bodies, and exit codes.

mod common;

use assert_cmd::Command;
use common::Fixture;
use predicates::prelude::*;

/// Get a Command for the ct-core binary.
fn ct_core() -> Command {
    let mut cmd = Command::cargo_bin("ct-core").expect("ct-core binary should exist");
    cmd.env_remove("CT_CONFIG").env("CT_LOG", "error");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ============================================================================
// Argument errors
// ============================================================================

mod invalid_arguments {
    use super::*;

    #[test]
    fn unknown_command_fails() {
        ct_core()
            .arg("nonexistent-command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn predict_requires_ip() {
        ct_core()
            .arg("predict")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--ip"));
    }

    #[test]
    fn invalid_variance_rejected_by_parser() {
        ct_core()
            .args(["analyze", "tcp-udp", "--variance", "bayes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("welch"));
    }
}

// ============================================================================
// Version
// ============================================================================

#[test]
fn version_reports_layout() {
    ct_core()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ct_core_version"))
        .stdout(predicate::str::contains("v1:id.orig_h"));
}

// ============================================================================
// Predict
// ============================================================================

mod predict {
    use super::*;

    #[test]
    fn valid_ip_scores() {
        let fx = Fixture::new();
        let output = ct_core()
            .args(fx.config_arg())
            .args(["predict", "--ip", "10.0.0.1"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let json = stdout_json(&output);
        assert_eq!(json["id_resp_h"], "10.0.0.1");
        // Default duration 1.0 under sigmoid(-3 + 0.6 d).
        let expected = 1.0 / (1.0 + (2.4f64).exp());
        let got = json["malicious_likelihood"].as_f64().unwrap();
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn invalid_ip_is_input_error() {
        let fx = Fixture::new();
        ct_core()
            .args(fx.config_arg())
            .args(["predict", "--ip", "not-an-ip"])
            .assert()
            .code(13)
            .stderr(predicate::str::contains("\"code\": 10"))
            .stderr(predicate::str::contains("not-an-ip"));
    }

    #[test]
    fn human_format() {
        let fx = Fixture::new();
        ct_core()
            .args(fx.config_arg())
            .args(["--format", "human", "predict", "--ip", "10.0.0.1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("malicious_likelihood: "));
    }
}

// ============================================================================
// Analyses
// ============================================================================

mod analyze {
    use super::*;

    #[test]
    fn duration_with_threshold_supports_alternative() {
        let fx = Fixture::new();
        let output = ct_core()
            .args(fx.config_arg())
            .args(["analyze", "duration", "--threshold", "3.5"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
        let json = stdout_json(&output);
        assert_eq!(json["long_count"], 24);
        assert_eq!(json["short_count"], 15);
        assert_eq!(json["threshold_duration"], 3.5);
        assert!(json["result"]
            .as_str()
            .unwrap()
            .starts_with("Alternative hypothesis supported"));
    }

    #[test]
    fn duration_defaults_to_median() {
        let fx = Fixture::new();
        let output = ct_core()
            .args(fx.config_arg())
            .args(["analyze", "duration"])
            .output()
            .unwrap();
        let json = stdout_json(&output);
        assert_eq!(json["threshold_duration"], 4.75);
        assert_eq!(json["long_count"], 16);
    }

    #[test]
    fn protocol_direction_in_wording() {
        let fx = Fixture::new();
        ct_core()
            .args(fx.config_arg())
            .args(["analyze", "protocol", "--protocol", "udp"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains(
                "UDP is significantly less likely to be malicious than other protocols.",
            ));
    }

    #[test]
    fn protocol_outside_tcp_udp_is_args_error() {
        let fx = Fixture::new();
        ct_core()
            .args(fx.config_arg())
            .args(["analyze", "protocol", "--protocol", "icmp"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("\"parameter\": \"protocol\""));
    }

    #[test]
    fn tcp_udp_reports_exclusions() {
        let fx = Fixture::new();
        let output = ct_core()
            .args(fx.config_arg())
            .args(["analyze", "tcp-udp", "--variance", "pooled"])
            .output()
            .unwrap();
        let json = stdout_json(&output);
        assert_eq!(json["excluded_count"], 3);
        assert_eq!(json["variance"], "pooled");
        assert_eq!(json["degrees_of_freedom"], 34.0);
    }

    #[test]
    fn empty_group_is_input_error() {
        let fx = Fixture::new();
        ct_core()
            .args(fx.config_arg())
            .args(["analyze", "duration", "--threshold", "1000"])
            .assert()
            .code(13)
            .stderr(predicate::str::contains("\"group\": \"long\""));
    }
}

// ============================================================================
// Top, fit-encoders, check
// ============================================================================

#[test]
fn top_ranks_responders() {
    let fx = Fixture::new();
    let output = ct_core()
        .args(fx.config_arg())
        .args(["top", "--limit", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    let hosts: Vec<&str> = json["responders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id_resp_h"].as_str().unwrap())
        .collect();
    assert_eq!(hosts, vec!["10.0.0.3", "10.0.0.6", "10.0.0.9"]);
}

#[test]
fn fit_encoders_writes_sorted_vocabulary() {
    let fx = Fixture::new();
    let out = fx.dir.path().join("fitted");
    let output = ct_core()
        .args(["fit-encoders", "--dataset"])
        .arg(&fx.dataset)
        .arg("--out-dir")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["protocol_classes"], serde_json::json!(["icmp", "tcp", "udp"]));
    assert_eq!(json["records"], 39);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("proto_encoder.json")).unwrap())
            .unwrap();
    assert_eq!(written["field"], "proto");
    assert!(out.join("conn_state_encoder.json").exists());
}

#[test]
fn check_reports_provenance() {
    let fx = Fixture::new();
    let output = ct_core()
        .args(fx.config_arg())
        .arg("check")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["scored_records"], 39);
    assert_eq!(json["provenance"]["model_kind"], "logistic_regression");
    assert_eq!(json["provenance"]["model"]["sha256"].as_str().unwrap().len(), 64);
    assert_eq!(json["provenance"]["config"]["source"], "flag");
}

// ============================================================================
// Startup failures
// ============================================================================

mod startup {
    use super::*;

    #[test]
    fn missing_model_is_artifact_error() {
        let fx = Fixture::new();
        std::fs::remove_file(&fx.model).unwrap();
        ct_core()
            .args(fx.config_arg())
            .args(["predict", "--ip", "10.0.0.1"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("\"code\": 30"));
    }

    #[test]
    fn artifact_flag_overrides_config() {
        let fx = Fixture::new();
        ct_core()
            .args(fx.config_arg())
            .args(["--model", "/nonexistent/model.json", "check"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("/nonexistent/model.json"));
    }

    #[test]
    fn invalid_config_is_config_error() {
        let fx = Fixture::new();
        fx.write_config("[analysis]\nalpha = 2.0\n");
        ct_core()
            .args(fx.config_arg())
            .arg("check")
            .assert()
            .code(12);
    }

    #[test]
    fn missing_config_file_is_config_error() {
        ct_core()
            .args(["--config", "/nonexistent/ct/config.toml", "check"])
            .assert()
            .code(12);
    }

    #[test]
    fn zero_duration_row_fails_scoring() {
        let dataset = format!(
            "{}\n192.168.1.1,1,10.0.0.1,80,tcp,1.0,10,10,SF,\n192.168.1.1,1,10.0.0.2,80,tcp,0,0,0,SF,\n",
            common::HEADER
        );
        let fx = Fixture::with(&dataset, &common::duration_logistic());
        ct_core()
            .args(fx.config_arg())
            .arg("check")
            .assert()
            .code(20)
            .stderr(predicate::str::contains("\"feature\": \"byte_rate\""));
    }
}
