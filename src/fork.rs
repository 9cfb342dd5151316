// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::group::ProcessGroup;
use crate::procs::ChildSpec;

pub struct StdIoConf {
    pub stdin: Stdio,
    pub stderr: Stdio,
    pub stdout: Stdio,
}

impl StdIoConf {
    /// stdout and stderr both land in a freshly truncated log file, stdin is /dev/null
    pub fn log_file(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let log = File::create(path)?;

        Ok(Self {
            stdin: Stdio::null(),
            stderr: Stdio::from(log.try_clone()?),
            stdout: Stdio::from(log),
        })
    }
}

/// A launched child, owned by the supervisor
#[derive(Debug)]
pub struct ChildHandle {
    name: String,
    pid: Pid,
    group: ProcessGroup,
    child: Child,
    status: Option<ExitStatus>,
}

impl ChildHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn group(&self) -> ProcessGroup {
        self.group
    }

    /// The exit status, if the child has already been reaped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Reaps the child if it has exited, without blocking
    pub fn is_alive(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!("{} ({}) exited: {}", self.name, self.pid, status);
                self.status = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                // the child can't be waited on, so it can't be ours anymore
                warn!("failed to check {} ({}): {}", self.name, self.pid, e);
                false
            }
        }
    }

    /// Waits for the child to exit, returns immediately if it was already reaped
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        let status = self.child.wait().await?;
        self.status = Some(status);
        Ok(status)
    }
}

/// Spawns the child as the leader of a new process group
pub fn new_process(spec: &ChildSpec) -> io::Result<ChildHandle> {
    let stdio = StdIoConf::log_file(spec.log_file())?;

    let mut command = Command::new(spec.program());
    command
        .args(spec.arguments())
        .process_group(0)
        .kill_on_drop(true)
        .stdin(stdio.stdin)
        .stdout(stdio.stdout)
        .stderr(stdio.stderr);

    if let Some(dir) = spec.working_directory() {
        command.current_dir(dir);
    }

    let child = command.spawn()?;
    let raw_pid = child
        .id()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "spawned child has no pid"))?;
    let pid = Pid::from_raw(raw_pid as i32);

    info!(
        "started {} (pid: {}), logging to {}",
        spec.name(),
        pid,
        spec.log_file().display()
    );

    Ok(ChildHandle {
        name: spec.name().to_string(),
        pid,
        group: ProcessGroup::led_by(pid),
        child,
        status: None,
    })
}
