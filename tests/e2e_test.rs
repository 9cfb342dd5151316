//! End-to-end tests driving the `streamrc` binary with stand-in collaborators
//!
//! The media server, `python3` and `gst-launch-1.0` are replaced by small shell scripts.

mod common;

use std::ffi::OsStr;
use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use common::*;

// writing an executable while another test forks can leave it busy (ETXTBSY)
static SERIAL: Mutex<()> = Mutex::new(());

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    /// Stand-ins for every collaborator, each records its pid.
    ///
    /// The media server then runs `media_server_script`, the others run until signalled.
    fn new(media_server_script: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).expect("mkdir bin");
        fs::create_dir_all(dir.path().join("public")).expect("mkdir public");

        let media_server = format!(
            "echo $$ > {}; {}",
            dir.path().join("mediamtx.pid").display(),
            media_server_script
        );
        write_script(&dir.path().join("mediamtx"), &media_server);
        write_script(&bin.join("python3"), &record_pid(dir.path(), "webserver"));
        write_script(&bin.join("gst-launch-1.0"), &record_pid(dir.path(), "gstreamer"));

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn logs(&self) -> PathBuf {
        self.path("logs")
    }

    /// Pids recorded by the long running stand-ins, once all of them have started
    fn pids(&self, names: &[&str]) -> Vec<Pid> {
        let mut pids = Vec::new();
        let started = wait_until(Duration::from_secs(10), || {
            pids = names
                .iter()
                .filter_map(|name| fs::read_to_string(self.path(&format!("{}.pid", name))).ok())
                .filter_map(|pid| pid.trim().parse::<i32>().ok())
                .map(Pid::from_raw)
                .collect();
            pids.len() == names.len()
        });

        assert!(started, "not every child was launched");
        pids
    }

    fn camera(&self) -> Command {
        self.camera_logging_to(self.logs().as_os_str())
    }

    fn camera_logging_to(&self, logs: &OsStr) -> Command {
        let search_path = format!(
            "{}:{}",
            self.path("bin").display(),
            std::env::var("PATH").unwrap_or_default()
        );

        let mut command = Command::new(env!("CARGO_BIN_EXE_streamrc"));
        command
            .arg("camera")
            .arg("--media-server")
            .arg(self.path("mediamtx"))
            .arg("--web-root")
            .arg(self.path("public"))
            .arg("--log-dir")
            .arg(logs)
            .arg("--startup-delay")
            .arg("100")
            .arg("--grace-period")
            .arg("200")
            .env("PATH", search_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

/// Script body that records its pid under `dir`, then keeps running
fn record_pid(dir: &Path, name: &str) -> String {
    format!("echo $$ > {}; exec sleep 30", dir.join(format!("{}.pid", name)).display())
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

fn wait_for_exit(child: &mut Child, limit: Duration) -> ExitStatus {
    let mut status = None;
    let exited = wait_until(limit, || {
        status = child.try_wait().expect("try_wait");
        status.is_some()
    });

    if !exited {
        child.kill().ok();
        panic!("streamrc did not exit within {:?}", limit);
    }

    status.expect("no exit status")
}

fn stdout_of(child: &mut Child) -> String {
    let mut out = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut out).ok();
    }
    out
}

fn assert_all_gone(pids: &[Pid]) {
    for &pid in pids {
        assert!(
            wait_until(Duration::from_secs(5), || is_gone(pid)),
            "{} outlived streamrc",
            pid
        );
    }
}

#[test]
fn test_interrupt_shuts_everything_down() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("exec sleep 30");

    let mut streamrc = fixture.camera().spawn().expect("failed to start streamrc");
    let pids = fixture.pids(&["mediamtx", "webserver", "gstreamer"]);
    assert!(pids.iter().all(|&pid| !is_gone(pid)));

    kill(Pid::from_raw(streamrc.id() as i32), Signal::SIGINT).expect("failed to interrupt");

    let status = wait_for_exit(&mut streamrc, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));
    assert!(stdout_of(&mut streamrc).contains("Cleanup complete."));
    assert_all_gone(&pids);
}

#[test]
fn test_repeated_signals_shut_down_once() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("exec sleep 30");

    let mut streamrc = fixture.camera().spawn().expect("failed to start streamrc");
    let pids = fixture.pids(&["mediamtx", "webserver", "gstreamer"]);

    let supervisor = Pid::from_raw(streamrc.id() as i32);
    kill(supervisor, Signal::SIGINT).expect("failed to interrupt");
    kill(supervisor, Signal::SIGINT).expect("failed to interrupt");
    kill(supervisor, Signal::SIGTERM).expect("failed to terminate");

    let status = wait_for_exit(&mut streamrc, Duration::from_secs(10));
    assert_eq!(status.code(), Some(0));

    let stdout = stdout_of(&mut streamrc);
    assert_eq!(stdout.matches("Cleanup complete.").count(), 1);
    assert_all_gone(&pids);
}

#[test]
fn test_invalid_utf8_option_is_rejected() {
    use std::os::unix::ffi::OsStrExt;

    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("exec sleep 30");

    let log_dir = fixture.dir.path().join(OsStr::from_bytes(b"logs-\xff"));
    let mut streamrc = fixture
        .camera_logging_to(log_dir.as_os_str())
        .spawn()
        .expect("failed to start streamrc");

    // a usage error, not a panic
    let status = wait_for_exit(&mut streamrc, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
    assert!(!log_dir.exists());

    let mut stderr = String::new();
    if let Some(mut err) = streamrc.stderr.take() {
        err.read_to_string(&mut stderr).ok();
    }
    assert!(stderr.contains("UTF-8"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_primary_exit_shuts_everything_down() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("sleep 1");

    let mut streamrc = fixture.camera().spawn().expect("failed to start streamrc");

    let status = wait_for_exit(&mut streamrc, Duration::from_secs(15));
    assert_eq!(status.code(), Some(0));

    let stdout = stdout_of(&mut streamrc);
    assert!(stdout.contains("Application is running."));
    assert!(stdout.contains("Cleanup complete."));
}

#[test]
fn test_missing_media_server_launches_nothing() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("exec sleep 30");
    fs::remove_file(fixture.path("mediamtx")).expect("remove media server");

    let mut streamrc = fixture.camera().spawn().expect("failed to start streamrc");

    let status = wait_for_exit(&mut streamrc, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
    assert!(!fixture.logs().exists(), "no child should have been started");
}

#[test]
fn test_missing_web_root_launches_nothing() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("exec sleep 30");
    fs::remove_dir(fixture.path("public")).expect("remove web root");

    let mut streamrc = fixture.camera().spawn().expect("failed to start streamrc");

    let status = wait_for_exit(&mut streamrc, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
    assert!(!fixture.logs().exists());
}

#[test]
fn test_launch_failure_tears_down_started_children() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new("exec sleep 30");
    // resolves and is executable, but can't be spawned
    fs::write(
        fixture.path("bin").join("gst-launch-1.0"),
        "#!/nonexistent/interpreter\n",
    )
    .expect("write pipeline");

    let mut streamrc = fixture.camera().spawn().expect("failed to start streamrc");
    let pids = fixture.pids(&["mediamtx", "webserver"]);

    let status = wait_for_exit(&mut streamrc, Duration::from_secs(10));
    assert_eq!(status.code(), Some(1));
    assert_all_gone(&pids);

    let mut stderr = String::new();
    if let Some(mut err) = streamrc.stderr.take() {
        err.read_to_string(&mut stderr).ok();
    }
    assert!(stderr.contains("during startup"), "unexpected stderr: {}", stderr);
    assert!(stderr.contains("gstreamer"));
}
