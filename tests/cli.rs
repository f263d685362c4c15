//! Process-level checks: the binary's stdout contract and exit status.

use std::process::{Command, Output};

fn stress(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ringbuf-stress"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run ringbuf-stress")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn should_print_banner_then_ok_when_reference_runs_one_second() {
    let output = stress(&["1", "--workers", "2"]);

    assert!(output.status.success(), "exit: {}", output.status);
    assert_eq!(stdout_lines(&output), vec!["stress test", "ok"]);
}

#[test]
fn should_abort_when_backend_misframes_ranges() {
    let output = stress(&[
        "5",
        "--workers",
        "3",
        "--backend",
        "faulty-misframe",
        "--fault-after",
        "10",
    ]);

    assert!(!output.status.success());
    assert_eq!(stdout_lines(&output), vec!["stress test"]);
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "exit: {}", output.status);
    }
}

#[test]
fn should_abort_when_backend_overruns_capacity() {
    let output = stress(&[
        "5",
        "--workers",
        "2",
        "--backend",
        "faulty-overrun",
        "--fault-after",
        "10",
    ]);

    assert!(!output.status.success());
    assert_eq!(stdout_lines(&output), vec!["stress test"]);
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(output.status.signal(), Some(6), "exit: {}", output.status);
    }
}

#[test]
fn should_print_json_summary_after_ok_when_requested() {
    let output = stress(&["1", "--workers", "2", "--json"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (head, json) = stdout.split_once("ok\n").expect("missing completion line");
    assert_eq!(head, "stress test\n");

    let summary: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(summary["backend"], "reference");
    assert_eq!(summary["workers"], 2);
    assert!(summary["frames_verified"].as_u64().unwrap() > 0);
}
