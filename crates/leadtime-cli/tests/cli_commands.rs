//! End-to-end tests for the leadtime binary.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn leadtime() -> Command {
    Command::new(env!("CARGO_BIN_EXE_leadtime"))
}

/// A small document: A(2bd) -> B(3bd), one dev resource.
const DOCUMENT: &str = r#"{
  "cache_hash": 2,
  "start_date": "2024-01-01T00:00:00",
  "roles": ["dev"],
  "resources": {
    "alice": { "roles": ["dev"], "start_date": "2024-01-01", "cost": 100.0, "cost_per_week": false }
  },
  "processes": {
    "A": {
      "last_date": "2024-01-01",
      "history": {
        "2024-01-01": {
          "name": "Alpha",
          "dependencies": [],
          "duration_days": 2,
          "pessimistic_days": 4,
          "optimistic_days": 1,
          "roles": ["dev"],
          "commitment": { "dev": 1.0 }
        }
      }
    },
    "B": {
      "last_date": "2024-01-01",
      "history": {
        "2024-01-01": {
          "name": "Beta",
          "dependencies": ["A"],
          "duration_days": 3,
          "pessimistic_days": 6,
          "optimistic_days": 2,
          "roles": ["dev"],
          "commitment": { "dev": 0.5 }
        }
      }
    }
  }
}"#;

const TICKET_DUMP: &str = r#"{
  "repo": "acme/widgets",
  "teams": {},
  "tickets": [
    {
      "ticket": {
        "id": 42,
        "title": "Checkout rewrite",
        "labels": ["3SPs"],
        "assignees": ["ana"],
        "created_at": "2024-05-01T00:00:00",
        "closed_at": "2024-05-12T00:00:00"
      },
      "events": [
        { "kind": "labeled", "created_at": "2024-05-06T00:00:00", "label": "in_progress" },
        { "kind": "closed", "created_at": "2024-05-12T00:00:00" }
      ]
    }
  ]
}"#;

fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp");
    file
}

#[test]
fn check_reports_document_summary() {
    let doc = write_temp(DOCUMENT, ".json");
    let output = leadtime()
        .arg("check")
        .arg(doc.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 processes"));
    assert!(stdout.contains("0 warnings"));
}

#[test]
fn schedule_text_shows_critical_path() {
    let doc = write_temp(DOCUMENT, ".json");
    let output = leadtime()
        .args(["schedule", "--as-of", "2024-01-01"])
        .arg(doc.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Critical path: A -> B"));
    assert!(stdout.contains("2024-01-08")); // project end: 5 business days in
}

#[test]
fn schedule_json_is_machine_readable() {
    let doc = write_temp(DOCUMENT, ".json");
    let output = leadtime()
        .args(["schedule", "--as-of", "2024-01-01", "--format", "json"])
        .arg(doc.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_eq!(report["project_end"], "2024-01-08");
    assert_eq!(report["critical_path"], serde_json::json!(["A", "B"]));
    assert_eq!(report["critical_path_length_days"], 5);
}

#[test]
fn stochastic_schedule_is_seeded() {
    let doc = write_temp(DOCUMENT, ".json");
    let run = || {
        let output = leadtime()
            .args([
                "schedule",
                "--as-of",
                "2024-01-01",
                "--stochastic",
                "--particles",
                "50",
                "--seed",
                "7",
                "--format",
                "json",
            ])
            .arg(doc.path())
            .output()
            .expect("run leadtime");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).to_string()
    };

    assert_eq!(run(), run());
}

#[test]
fn unknown_terminal_fails_with_message() {
    let doc = write_temp(DOCUMENT, ".json");
    let output = leadtime()
        .args(["schedule", "--as-of", "2024-01-01", "--terminal", "GHOST"])
        .arg(doc.path())
        .output()
        .expect("run leadtime");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GHOST"));
}

#[test]
fn demand_totals_are_conserved() {
    let doc = write_temp(DOCUMENT, ".json");
    let output = leadtime()
        .args(["demand", "--as-of", "2024-01-01", "--format", "json"])
        .arg(doc.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let dev: f64 = report["hours_per_role"]["dev"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .sum();
    // A: 1.0 x 40 x 2/5 = 16 h, B: 0.5 x 40 x 3/5 = 12 h
    assert!((dev - 28.0).abs() < 1e-6, "dev hours {dev}");
}

#[test]
fn evolution_lists_prediction_dates() {
    let doc = write_temp(DOCUMENT, ".json");
    let output = leadtime()
        .args(["evolution", "--format", "json"])
        .arg(doc.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let points = report["points"].as_array().unwrap();
    assert!(!points.is_empty());
    assert_eq!(points[0]["observed_on"], "2024-01-01");
    assert_eq!(points[0]["predicted_end"], "2024-01-08");
}

#[test]
fn burndown_over_a_ticket_dump() {
    let dump = write_temp(TICKET_DUMP, ".json");
    let output = leadtime()
        .args([
            "burndown",
            "--label",
            "in_progress",
            "--from",
            "2024-05-05",
            "--to",
            "2024-05-14",
            "--format",
            "json",
        ])
        .arg(dump.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let curve: Vec<f64> = report["labels"]["in_progress"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    // 3 SPs in progress from May 6 until the close on May 12
    assert_eq!(curve, vec![0.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 0.0, 0.0]);
}

#[test]
fn burndown_reads_config_for_pattern() {
    let dump = write_temp(TICKET_DUMP, ".json");
    let config = write_temp(
        "tracking_labels = [\"in_progress\"]\nstorypoint_pattern = \"<value>SPs\"\n",
        ".toml",
    );
    let output = leadtime()
        .args([
            "burndown",
            "--from",
            "2024-05-05",
            "--to",
            "2024-05-07",
            "--format",
            "json",
        ])
        .arg("--config")
        .arg(config.path())
        .arg(dump.path())
        .output()
        .expect("run leadtime");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(report["labels"]["in_progress"].is_array());
}
