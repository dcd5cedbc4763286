//! Deadline enforcement against real process trees.

#![cfg(unix)]

use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use toolsweep_runner::tree;
use toolsweep_runner::{CommandSpec, NativeRunner, ProcessRunner, RunLimits};

fn limits(timeout_ms: u64, reap_ms: u64) -> RunLimits {
    RunLimits {
        timeout: Duration::from_millis(timeout_ms),
        reap_timeout: Duration::from_millis(reap_ms),
    }
}

fn gone_within(pid: u32, bound: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < bound {
        if !tree::is_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn background_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|l| l.trim().parse::<u32>().ok())
        .collect()
}

#[test]
fn test_timeout_returns_within_bound() {
    let l = limits(400, 2_000);
    let start = Instant::now();
    let result = NativeRunner::new()
        .run(&CommandSpec::new("sleep").arg("30"), l)
        .unwrap();
    let waited = start.elapsed();

    assert!(result.timed_out);
    assert!(result.exit_code.is_none());
    assert!(waited >= l.timeout);
    assert!(waited < l.timeout + l.reap_timeout + Duration::from_secs(1), "took {:?}", waited);
}

#[test]
#[cfg(target_os = "linux")]
fn test_timeout_bound_holds_when_pipes_stay_open() {
    // The detached sleeper escapes both the group kill and the descendant
    // walk, and keeps stdout and stderr open after the root is killed
    let script = "(setsid sh -c 'echo $$; exec sleep 30' &); sleep 30";
    let l = limits(500, 1_000);
    let start = Instant::now();
    let result = NativeRunner::new()
        .run(&CommandSpec::new("sh").arg("-c").arg(script), l)
        .unwrap();
    let waited = start.elapsed();

    let pids = background_pids(&result.output);
    for &pid in &pids {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }

    assert!(result.timed_out);
    let bound = l.timeout + l.reap_timeout + Duration::from_millis(700);
    assert!(waited < bound, "took {:?}", waited);
    assert_eq!(pids.len(), 1, "partial output lost: {:?}", result.output);
}

#[test]
fn test_natural_exit_sweeps_background_children() {
    let l = limits(30_000, 5_000);
    let cmd = CommandSpec::new("sh").arg("-c").arg("sleep 60 & echo $!; exit 0");
    let result = NativeRunner::new().run(&cmd, l).unwrap();

    assert!(!result.timed_out);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.elapsed < Duration::from_secs(2), "took {:?}", result.elapsed);

    let pids = background_pids(&result.output);
    assert_eq!(pids.len(), 1, "output was {:?}", result.output);
    assert!(
        gone_within(pids[0], Duration::from_secs(3)),
        "background {} still running",
        pids[0]
    );
}

#[test]
fn test_timeout_kills_grandchildren() {
    let script = "sleep 30 & echo $!; sleep 30 & echo $!; wait";
    let result = NativeRunner::new()
        .run(&CommandSpec::new("sh").arg("-c").arg(script), limits(500, 2_000))
        .unwrap();

    assert!(result.timed_out);
    let pids = background_pids(&result.output);
    assert_eq!(pids.len(), 2, "output was {:?}", result.output);
    for pid in pids {
        assert!(gone_within(pid, Duration::from_secs(3)), "grandchild {} still running", pid);
    }
}

#[test]
fn test_nested_shells_are_killed() {
    let script = "sh -c 'sleep 30 & echo $!; wait' & wait";
    let result = NativeRunner::new()
        .run(&CommandSpec::new("sh").arg("-c").arg(script), limits(500, 2_000))
        .unwrap();

    assert!(result.timed_out);
    for pid in background_pids(&result.output) {
        assert!(
            gone_within(pid, Duration::from_secs(3)),
            "great-grandchild {} still running",
            pid
        );
    }
}

#[test]
fn test_fast_exit_beats_deadline() {
    let result = NativeRunner::new()
        .run(&CommandSpec::new("sh").arg("-c").arg("echo done"), limits(5_000, 1_000))
        .unwrap();
    assert!(!result.timed_out);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.output, "done\n");
    assert!(result.elapsed < Duration::from_secs(5));
}

#[test]
fn test_working_directory_is_used() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
    let cmd = CommandSpec::new("cat").arg("marker.txt").cwd(dir.path());
    let result = NativeRunner::new().run(&cmd, limits(5_000, 1_000)).unwrap();
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.output, "here");
}
