// SPDX-FileCopyrightText: 2026 agentscan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line tests that run the built binary against a temp database.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use serde_json::Value;

const SCANNER: &str = r#"printf '{"tool_version":"1.0","findings":[{"rule_id":"demo.sqli","severity":"high","category":"sql_injection","title":"SQL injection","file":"app.py","line":7}]}'"#;

struct Env {
    dir: tempfile::TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("agentscan.db");
        let config = dir.path().join("agentscan.toml");
        std::fs::write(
            &config,
            format!(
                r#"
[service]
log_level = "warn"
worker_count = 2
poll_interval_ms = 50
health_check_interval_secs = 1
shutdown_timeout_secs = 5

[storage]
database_path = "{}"

[[agents]]
name = "demo"
command = "sh"
args = ["-c", {SCANNER:?}]
health_args = ["-c", "exit 0"]
categories = ["sql_injection"]
timeout_secs = 10
"#,
                db.display()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_agentscan"));
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().unwrap()
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "agentscan {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn submit(&self) -> String {
        let submitted = self.json(&[
            "submit",
            "--repo-url",
            "https://example.com/acme/app.git",
            "--commit",
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904",
            "--agent",
            "demo",
            "--priority",
            "8",
        ]);
        assert_eq!(submitted["status"], "queued");
        submitted["scan_id"].as_str().unwrap().to_string()
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[test]
fn submit_status_list_and_cancel() {
    let env = Env::new();
    let scan_id = env.submit();

    let status = env.json(&["status", &scan_id]);
    assert_eq!(status["status"], "queued");
    assert_eq!(status["agents_requested"][0], "demo");

    let list = env.json(&["list"]);
    assert_eq!(list["total"], 1);
    assert_eq!(list["scans"][0]["job_id"], scan_id.as_str());

    let stats = env.json(&["queue-stats"]);
    assert_eq!(stats["total"], 1);

    let cancelled = env.json(&["cancel", &scan_id]);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(env.json(&["status", &scan_id])["status"], "cancelled");

    let again = env.run(&["cancel", &scan_id]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("invalid state"));
}

#[test]
fn bad_input_exits_with_status_one() {
    let env = Env::new();

    let output = env.run(&["status", "not-a-uuid"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid job id"));

    let output = env.run(&[
        "submit",
        "--repo-url",
        "https://example.com/acme/app.git",
        "--commit",
        "abc",
        "--agent",
        "demo",
        "--priority",
        "11",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("priority"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("agentscan.toml");
    std::fs::write(&config, "[service]\nworker_cnt = 3\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_agentscan"))
        .arg("--config")
        .arg(&config)
        .arg("queue-stats")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn agents_reports_health() {
    let env = Env::new();
    let stats = env.json(&["agents"]);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["healthy"], 1);
    assert_eq!(stats["agents"][0]["name"], "demo");
}

#[cfg(unix)]
#[test]
fn serve_processes_submitted_scan_and_stops_on_sigterm() {
    let env = Env::new();
    let scan_id = env.submit();

    let mut server = env.command().arg("serve").spawn().unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let status = loop {
        let status = env.json(&["status", &scan_id]);
        if status["status"] == "completed" || Instant::now() > deadline {
            break status;
        }
        std::thread::sleep(Duration::from_millis(100));
    };
    assert_eq!(status["status"], "completed", "{status}");
    assert_eq!(status["agents_completed"][0], "demo");

    let results = env.json(&["results", &scan_id, "--severity", "high"]);
    assert_eq!(results["summary"]["total_findings"], 1);
    assert_eq!(results["findings"][0]["rule_id"], "demo.sqli");
    assert_eq!(results["findings"][0]["tool"], "demo");

    let killed = Command::new("kill")
        .arg("-TERM")
        .arg(server.id().to_string())
        .status()
        .unwrap();
    assert!(killed.success());
    let exit = server.wait().unwrap();
    assert!(exit.success(), "serve exited with {exit}");
    assert!(env.path().join("agentscan.db").exists());
}
