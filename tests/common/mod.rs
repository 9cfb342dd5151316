//! Shared helpers for the supervisor integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use nix::unistd::Pid;
use streamrc::procs::ChildSpec;

/// Initialize tracing for tests (idempotent)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A child that runs until it is signalled
pub fn sleeper(dir: &Path, name: &str) -> ChildSpec {
    ChildSpec::new(name, "sleep", dir.join(format!("{}.log", name))).args(vec!["30"])
}

/// A child running a `/bin/sh -c` script
pub fn shell(dir: &Path, name: &str, script: &str) -> ChildSpec {
    ChildSpec::new(name, "sh", dir.join(format!("{}.log", name))).args(vec!["-c", script])
}

/// True once the process no longer exists, or is a zombie nobody has reaped yet
pub fn is_gone(pid: Pid) -> bool {
    let stat = match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat,
        Err(_) => return true,
    };

    // the state follows the parenthesised command name
    stat.rsplit(')')
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .map(|state| state == "Z" || state == "X")
        .unwrap_or(true)
}

/// Polls `check` until it passes or `limit` expires
pub fn wait_until<F: FnMut() -> bool>(limit: Duration, mut check: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }

    check()
}
