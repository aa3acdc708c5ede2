// End to end: event file in, Allure result files out

use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn get_binary() -> String {
    env!("CARGO_BIN_EXE_allure-relay").to_string()
}

const EVENTS: &str = r#"{"event":"specStarted","spec":"cypress/e2e/login.cy.js","at":1000}
{"event":"hookStarted","title":"\"before all\" hook: seed","at":1001}
{"event":"hookEnded","status":"passed","at":1002}
{"event":"suiteStarted","title":"Login","at":1003}
{"event":"testStarted","title":"accepts valid credentials","at":1004}
{"event":"stepStarted","name":"type password","at":1005}
{"event":"stepEnded","status":"passed","at":1006}
{"event":"attachment","name":"note","content":"aGVsbG8=","contentType":"text/plain"}
{"event":"testEnded","status":"passed","at":1007}
this line is not an event
{"event":"testStarted","title":"rejects bad credentials","at":1008}
{"event":"testEnded","status":"failed","message":"expected error banner","at":1009}
{"event":"suiteEnded","at":1010}
{"event":"specEnded","at":1011}
{"event":"runEnded","at":1012}
"#;

fn write_events(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("events.jsonl");
    std::fs::write(&path, EVENTS).expect("write events");
    path
}

fn files_ending(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.to_string_lossy().ends_with(suffix))
        .collect();
    files.sort();
    files
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json")
}

fn replay(dir: &TempDir, extra: &[&str]) -> std::process::Output {
    let events = write_events(dir);
    let results = dir.path().join("allure-results");
    Command::new(get_binary())
        .current_dir(dir.path())
        .env_remove("ALLURE_RELAY_WORKER_PORT")
        .arg("replay")
        .arg(&events)
        .arg("--results-dir")
        .arg(&results)
        .args(extra)
        .output()
        .expect("Failed to execute replay command")
}

fn assert_results(results: &Path) {
    let result_files = files_ending(results, "-result.json");
    assert_eq!(result_files.len(), 2, "{:?}", result_files);

    let mut by_name = std::collections::HashMap::new();
    for file in &result_files {
        let json = read_json(file);
        by_name.insert(json["name"].as_str().expect("name").to_string(), json);
    }

    let passed = &by_name["accepts valid credentials"];
    assert_eq!(passed["status"], "passed");
    assert_eq!(passed["fullName"], "cypress/e2e/login.cy.js#Login accepts valid credentials");
    assert_eq!(passed["steps"][0]["name"], "type password");
    assert_eq!(passed["start"], 1004);

    let attachment = passed["attachments"][0]["source"].as_str().expect("source");
    assert_eq!(
        std::fs::read_to_string(results.join(attachment)).expect("attachment"),
        "hello"
    );

    let failed = &by_name["rejects bad credentials"];
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["statusDetails"]["message"], "expected error banner");

    let containers = files_ending(results, "-container.json");
    assert_eq!(containers.len(), 1);
    let container = read_json(&containers[0]);
    assert_eq!(container["name"], "Login");
    assert_eq!(container["children"].as_array().map(Vec::len), Some(2));
    assert_eq!(container["befores"][0]["name"], "\"before all\" hook: seed");
}

#[test]
fn test_replay_writes_results_locally() {
    let dir = TempDir::new().expect("temp dir");
    let output = replay(&dir, &[]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Replayed 14 event(s)"), "{}", stdout);

    assert_results(&dir.path().join("allure-results"));
}

#[test]
fn test_replay_through_worker_process() {
    let dir = TempDir::new().expect("temp dir");
    let output = replay(&dir, &["--remote"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_results(&dir.path().join("allure-results"));
}

#[test]
fn test_replay_moves_finished_spec_to_watch_dir() {
    let dir = TempDir::new().expect("temp dir");
    let watch = dir.path().join("watch");
    let output = replay(&dir, &["--watch-dir", watch.to_str().expect("utf8 path")]);

    assert!(output.status.success());
    assert_results(&watch);
    assert!(files_ending(&dir.path().join("allure-results"), ".json").is_empty());
}

#[test]
fn test_replay_missing_file_fails() {
    let dir = TempDir::new().expect("temp dir");
    let output = Command::new(get_binary())
        .current_dir(dir.path())
        .args(["replay", "does-not-exist.jsonl"])
        .output()
        .expect("Failed to execute replay command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read events"));
}
