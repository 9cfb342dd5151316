// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ErrorKind {
    /// A required executable, tool or path is absent, nothing was launched for it
    #[error("precondition failed for {name}: {reason}")]
    Precondition { name: String, reason: String },
    /// The OS refused to start the child
    #[error("failed to launch {name} (#{index}): {source}")]
    Launch {
        index: usize,
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to deliver {signal} to process group {pgid}: {errno}")]
    SignalDelivery {
        pgid: Pid,
        signal: Signal,
        errno: Errno,
    },
    #[error("no child processes have been launched")]
    NoChildren,
    #[error("io error")]
    IoError(#[from] io::Error),
    #[error("nix error")]
    NixError(#[from] nix::Error),
    #[error("an error occured: {0}")]
    ErrorMsg(String),
    #[error("an error occured: {0}")]
    ErrorStr(&'static str),
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn precondition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Precondition {
            name: name.into(),
            reason: reason.into(),
        })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self.0, ErrorKind::Precondition { .. })
    }

    pub fn is_launch(&self) -> bool {
        matches!(self.0, ErrorKind::Launch { .. })
    }

    /// The target of a signal was already gone
    pub fn is_no_such_process(&self) -> bool {
        match self.0 {
            ErrorKind::SignalDelivery { errno, .. } => errno == Errno::ESRCH,
            ErrorKind::NixError(errno) => errno == Errno::ESRCH,
            _ => false,
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<ErrorKind>,
{
    fn from(err: E) -> Self {
        Self::from_kind(err.into())
    }
}

impl From<&'static str> for Error {
    fn from(err: &'static str) -> Self {
        Self::from_kind(ErrorKind::ErrorStr(err))
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::from_kind(ErrorKind::ErrorMsg(err))
    }
}
