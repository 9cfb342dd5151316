// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::error::ErrorKind;
use crate::Error;

/// Capability to signal a child and every process it has forked into its group.
///
/// Children are spawned as group leaders, so the group id is the leader's pid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessGroup(Pid);

impl ProcessGroup {
    pub fn led_by(leader: Pid) -> Self {
        Self(leader)
    }

    pub fn id(&self) -> Pid {
        self.0
    }

    /// Ask the whole group to exit, SIGTERM
    pub fn terminate(&self) -> Result<(), Error> {
        self.signal(Signal::SIGTERM)
    }

    /// Unconditionally kill the whole group, SIGKILL
    pub fn kill(&self) -> Result<(), Error> {
        self.signal(Signal::SIGKILL)
    }

    pub fn signal(&self, signal: Signal) -> Result<(), Error> {
        killpg(self.0, signal).map_err(|errno| {
            Error::from(ErrorKind::SignalDelivery {
                pgid: self.0,
                signal,
                errno,
            })
        })?;

        debug!("sent {} to process group {}", signal, self.0);
        Ok(())
    }
}

impl fmt::Display for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pgid:{}", self.0)
    }
}
