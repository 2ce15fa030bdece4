use std::path::{Path, PathBuf};
use std::process::Command;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "cropstep-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn run(args: &[&str], workspace: &Path, output_path: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_cropstep-tester"))
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .arg("--output")
        .arg(output_path)
        .output()
        .expect("run cli")
}

#[test]
fn cli_list_policies_writes_output() {
    let output_path = temp_path("list");
    let output = run(&["--list-policies"], &temp_path("list-ws"), &output_path);
    assert!(output.status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available policies"));
    for key in ["none", "fixed", "threshold", "random"] {
        assert!(content.contains(key), "{key}");
    }
}

#[test]
fn cli_runs_rollout_with_json_report() {
    let output_path = temp_path("json");
    let output = run(
        &[
            "--policies",
            "none,fixed",
            "--seeds",
            "5",
            "--season-length",
            "10",
            "--report",
            "json",
        ],
        &temp_path("json-ws"),
        &output_path,
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cropstep Policy Tester"));

    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let episodes = report["episodes"].as_array().expect("episodes");
    assert_eq!(episodes.len(), 2);
    assert!(episodes.iter().all(|e| e["steps"] == 10));
    assert_eq!(report["summaries"][1]["policy"], "fixed");
}

#[test]
fn cli_process_gateway_matches_reference() {
    let reference_path = temp_path("reference");
    let process_path = temp_path("process");
    let args = [
        "--policies",
        "threshold",
        "--seeds",
        "9",
        "--season-length",
        "6",
        "--report",
        "csv",
    ];
    let reference = run(&args, &temp_path("reference-ws"), &reference_path);
    assert!(reference.status.success());

    let mut process_args = args.to_vec();
    process_args.extend(["--gateway", "process"]);
    let process = run(&process_args, &temp_path("process-ws"), &process_path);
    assert!(process.status.success(), "{}", String::from_utf8_lossy(&process.stderr));

    let reference_csv = std::fs::read_to_string(reference_path).expect("read reference");
    let process_csv = std::fs::read_to_string(process_path).expect("read process");
    assert_eq!(reference_csv.lines().count(), 2);
    assert_eq!(reference_csv, process_csv);
}

#[test]
fn cli_ranges_scans_episode_logs() {
    let log_dir = temp_path("logs");
    let rollout = run(
        &[
            "--policies",
            "random",
            "--seeds",
            "2,3",
            "--season-length",
            "8",
            "--log-dir",
            log_dir.to_str().expect("utf-8 temp dir"),
        ],
        &temp_path("logs-ws"),
        &temp_path("logs-report"),
    );
    assert!(rollout.status.success(), "{}", String::from_utf8_lossy(&rollout.stderr));

    let output_path = temp_path("ranges");
    let output = Command::new(env!("CARGO_BIN_EXE_cropstep-tester"))
        .arg("--ranges")
        .arg(&log_dir)
        .arg("--output")
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Scanned 2 log files, 18 logged rows"));
    assert!(content.contains("soil_water_0_30"));
    assert!(content.contains("non-negative"));
}

#[test]
fn cli_check_determinism_reports_match() {
    let output_path = temp_path("determinism");
    let output = run(
        &[
            "--check-determinism",
            "--policies",
            "random",
            "--seeds",
            "4",
            "--season-length",
            "12",
        ],
        &temp_path("determinism-ws"),
        &output_path,
    );
    assert!(output.status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("MATCH"));
    assert!(!content.contains("DIFFER"));
}
