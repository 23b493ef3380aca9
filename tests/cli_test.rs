// Drives the built binary end to end: settings writing, replay of recorded
// output, and a short supervised session.

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_enginewarden");

fn run(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .output()
        .expect("failed to launch enginewarden")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_write_settings_produces_exact_json() {
    let dir = tempfile::tempdir().unwrap();
    let engine_dir = dir.path().to_str().unwrap();

    let output = run(&["write-settings", "--engine-dir", engine_dir, "--arrow-color", "#FFFF80"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let written = fs::read_to_string(dir.path().join("settings.json")).unwrap();
    assert_eq!(
        written,
        r##"{"enabled":true,"side":"white","elo":2000,"arrow_color":"#FFFF80"}"##
    );
}

#[test]
fn test_write_settings_keeps_previous_values() {
    let dir = tempfile::tempdir().unwrap();
    let engine_dir = dir.path().to_str().unwrap();

    assert!(run(&["write-settings", "-d", engine_dir, "--elo", "1500"]).status.success());
    assert!(run(&["write-settings", "-d", engine_dir, "--side", "black", "--legit-mode", "true"])
        .status
        .success());

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("settings.json")).unwrap()).unwrap();
    assert_eq!(written["elo"], 1500);
    assert_eq!(written["side"], "black");
    assert_eq!(written["legit_mode"], true);
    assert!(written.get("blunder_chance").is_none());
}

#[test]
fn test_write_settings_legit_variance_keys() {
    let dir = tempfile::tempdir().unwrap();
    let engine_dir = dir.path().to_str().unwrap();

    let output = run(&[
        "write-settings",
        "-d",
        engine_dir,
        "--skill-variance",
        "0.3",
        "--consistency",
        "85",
        "--elo-variance",
        "150",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("settings.json")).unwrap()).unwrap();
    assert_eq!(written["skill_variance"], 0.3);
    assert_eq!(written["consistency"], 85);
    assert_eq!(written["elo_variance"], 150);

    assert!(!run(&["write-settings", "-d", engine_dir, "--consistency", "101"]).status.success());
}

#[test]
fn test_write_settings_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let engine_dir = dir.path().to_str().unwrap();

    assert!(!run(&["write-settings", "-d", engine_dir, "--elo=strong"]).status.success());
    assert!(!run(&["write-settings", "-d", engine_dir, "--arrow-color", "blue"]).status.success());
    assert!(!run(&["write-settings", "-d", engine_dir, "--blunder-chance", "150%"]).status.success());
    assert!(!dir.path().join("settings.json").exists());
}

#[test]
fn test_replay_raw_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("engine.out");
    fs::write(&input, "Loaded engine\n\nEVAL:mate\n\x1b[32mEVAL:-1.2\x1b[0m\n").unwrap();

    let output = run(&["replay", "--input", input.to_str().unwrap(), "--bar-width", "10"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("3 lines, 2 evaluations (1 rejected), 0 stderr lines"), "{}", stdout);
    assert!(stdout.contains("[####------] -1.20 (negative"), "{}", stdout);
}

#[test]
fn test_replay_supervisor_log() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("supervisor.log");
    let log = [
        r#"{"timestamp":"2026-01-01T00:00:00Z","source":"supervisor","text":"Engine started"}"#,
        r#"{"timestamp":"2026-01-01T00:00:01Z","source":"stdout","text":"EVAL:+0.35"}"#,
        r#"{"timestamp":"2026-01-01T00:00:02Z","source":"stderr","text":"Traceback"}"#,
    ]
    .join("\n");
    fs::write(&input, log).unwrap();

    let output = run(&["replay", "-i", input.to_str().unwrap()]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("2 lines, 1 evaluations (0 rejected), 1 stderr lines"), "{}", stdout);
    assert!(stdout.contains("+0.35 (positive"), "{}", stdout);
}

#[cfg(unix)]
#[test]
fn test_run_session_until_quit() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(BIN)
        .args([
            "run",
            "--engine-dir",
            dir.path().to_str().unwrap(),
            "--program",
            "sh",
            "--arg",
            "-c",
            "--arg",
            "exec sleep 30",
            "--quiet",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(500));
    child.stdin.as_mut().unwrap().write_all(b"status\nquit\n").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("status: running"), "{}", stdout);
    assert!(dir.path().join("settings.json").exists());

    let journal = fs::read_to_string(dir.path().join("supervisor.log")).unwrap();
    assert!(journal.contains("Engine started"));
    assert!(journal.contains("Engine stop requested"));
    assert!(!journal.contains("unexpectedly"));
}

#[test]
fn test_run_survives_failed_autostart() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(BIN)
        .args([
            "run",
            "--engine-dir",
            dir.path().to_str().unwrap(),
            "--program",
            "/nonexistent/engine-binary",
            "--quiet",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child.stdin.as_mut().unwrap().write_all(b"status\nquit\n").unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not start engine"), "{}", stderr);
    assert!(stdout_of(&output).contains("status: off | no engine"));

    let journal = fs::read_to_string(dir.path().join("supervisor.log")).unwrap();
    assert!(journal.contains("Failed to launch /nonexistent/engine-binary"));
}
