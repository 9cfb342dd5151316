// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod capture;
mod file_server;
mod media_server;
mod supervisor;
mod transcode;

pub use capture::Capture;
pub use file_server::FileServer;
pub use media_server::MediaServer;
pub use supervisor::{
    Event, Outcome, Phase, ShutdownReport, ShutdownSignals, Supervisor, SupervisorState, Visit,
    DEFAULT_GRACE_PERIOD,
};
pub use transcode::Transcode;

use std::env;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Arg, ArgMatches};

use crate::Error;

pub const LOG_DIR: &str = "log-dir";
pub const GRACE_PERIOD: &str = "grace-period";
pub const STARTUP_DELAY: &str = "startup-delay";
pub const RTSP_URL: &str = "rtsp-url";

pub const CAMERA: &str = "camera";
pub const TRANSCODE: &str = "transcode";

/// A process the launcher knows how to start
///
/// Each one contributes its own command line options, and builds its `ChildSpec` from the parsed matches.
pub trait Process {
    const NAME: &'static str;
    /// File name of the log under the log directory
    const LOG_NAME: &'static str;

    fn args() -> Vec<Arg<'static, 'static>> {
        Vec::new()
    }

    fn child_spec(args: &ArgMatches<'_>) -> Result<ChildSpec, Error>;
}

/// Launch-time description of a child process
#[derive(Clone, Debug)]
pub struct ChildSpec {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    log_file: PathBuf,
    requires: Vec<PathBuf>,
    delay: Option<Duration>,
}

impl ChildSpec {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            log_file: log_file.into(),
            requires: Vec::new(),
            delay: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// A path that has to exist before this child may be spawned
    pub fn requires(mut self, path: impl Into<PathBuf>) -> Self {
        self.requires.push(path.into());
        self
    }

    /// Time to wait after this child starts before the next one is launched
    pub fn delay_next(mut self, delay: Duration) -> Self {
        self.delay = if delay.as_nanos() == 0 {
            None
        } else {
            Some(delay)
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Checks the program resolves and that every required path is present
    pub fn check(&self) -> Result<PathBuf, Error> {
        let program = resolve_program(&self.program, env::var_os("PATH").as_deref())
            .ok_or_else(|| {
                Error::precondition(
                    self.name.as_str(),
                    format!("no executable found at '{}'", self.program.display()),
                )
            })?;

        if let Some(missing) = self.requires.iter().find(|path| !path.exists()) {
            return Err(Error::precondition(
                self.name.as_str(),
                format!("required path '{}' does not exist", missing.display()),
            ));
        }

        Ok(program)
    }
}

/// Paths with a separator are taken as is, bare names are searched for on the `PATH`
pub fn resolve_program(program: &Path, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return if is_executable(program) {
            Some(program.to_path_buf())
        } else {
            None
        };
    }

    env::split_paths(search_path?)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// A regular file with at least one execute bit set
fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Location of a process' log, under the configured log directory
pub fn log_path<P: Process>(args: &ArgMatches<'_>) -> PathBuf {
    let dir = args.value_of_os(LOG_DIR).unwrap_or_else(|| OsStr::new("/tmp"));
    Path::new(dir).join(P::LOG_NAME)
}

/// Reads a millisecond option
pub fn millis(args: &ArgMatches<'_>, name: &str) -> Result<Duration, Error> {
    let value = args
        .value_of(name)
        .ok_or_else(|| format!("{} is required", name))?;
    let ms = value
        .parse::<u64>()
        .map_err(|_| format!("{} must be a number of milliseconds: {}", name, value))?;

    Ok(Duration::from_millis(ms))
}

pub(crate) fn required<'a>(args: &'a ArgMatches<'_>, name: &'static str) -> Result<&'a str, Error> {
    args.value_of(name)
        .ok_or_else(|| Error::from(format!("{} is required", name)))
}

/// The media server, the file server and the camera capture pipeline
pub fn camera_specs(args: &ArgMatches<'_>) -> Result<Vec<ChildSpec>, Error> {
    Ok(vec![
        MediaServer::child_spec(args)?,
        FileServer::child_spec(args)?,
        Capture::child_spec(args)?,
    ])
}

/// The media server, the file server and the transcode pipeline
pub fn transcode_specs(args: &ArgMatches<'_>) -> Result<Vec<ChildSpec>, Error> {
    Ok(vec![
        MediaServer::child_spec(args)?,
        FileServer::child_spec(args)?,
        Transcode::child_spec(args)?,
    ])
}
