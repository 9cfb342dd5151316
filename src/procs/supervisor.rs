// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::process::ExitStatus;
use std::time::Duration;

use futures::future::{self, FutureExt};
use futures::select;
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::error::ErrorKind;
use crate::fork::{self, ChildHandle};
use crate::group::ProcessGroup;
use crate::procs::ChildSpec;
use crate::Error;

/// Time between asking the process groups to terminate and killing them
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// What ended the supervised run
#[derive(Debug)]
pub enum Event {
    /// The watched child exited
    Exited { index: usize, status: ExitStatus },
    /// The supervisor itself was asked to stop
    Signalled(Signal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Graceful,
    Forced,
}

impl Phase {
    fn signal(self) -> Signal {
        match self {
            Phase::Graceful => Signal::SIGTERM,
            Phase::Forced => Signal::SIGKILL,
        }
    }

    fn deliver(self, group: ProcessGroup) -> Result<(), Error> {
        match self {
            Phase::Graceful => group.terminate(),
            Phase::Forced => group.kill(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Nothing was left in the child's group to signal
    AlreadyExited,
    Failed(String),
}

/// One child visited during one phase of shutdown
#[derive(Clone, Debug)]
pub struct Visit {
    pub phase: Phase,
    pub index: usize,
    pub name: String,
    pub outcome: Outcome,
}

/// Everything shutdown did, in the order it did it
#[derive(Clone, Debug, Default)]
pub struct ShutdownReport {
    visits: Vec<Visit>,
}

impl ShutdownReport {
    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    /// Indexes visited during the phase, in visiting order
    pub fn visited(&self, phase: Phase) -> Vec<usize> {
        self.visits
            .iter()
            .filter(|v| v.phase == phase)
            .map(|v| v.index)
            .collect()
    }

    /// Indexes that were actually signalled during the phase
    pub fn delivered(&self, phase: Phase) -> Vec<usize> {
        self.visits
            .iter()
            .filter(|v| v.phase == phase && v.outcome == Outcome::Delivered)
            .map(|v| v.index)
            .collect()
    }

    pub fn signals_delivered(&self) -> usize {
        self.visits
            .iter()
            .filter(|v| v.outcome == Outcome::Delivered)
            .count()
    }
}

/// SIGINT and SIGTERM aimed at the supervisor.
///
/// Delivery only queues the event, the supervisor consumes it from its own task. Repeated signals
///   coalesce in the queue, so shutdown is never entered twice.
#[derive(Debug)]
pub struct ShutdownSignals {
    interrupt: SignalStream,
    terminate: SignalStream,
}

impl ShutdownSignals {
    /// Must be called from within the tokio runtime
    pub fn install() -> Result<Self, Error> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    pub async fn recv(&mut self) -> Signal {
        select! {
            _ = self.interrupt.recv().fuse() => Signal::SIGINT,
            _ = self.terminate.recv().fuse() => Signal::SIGTERM,
        }
    }
}

/// The launched children, in launch order
#[derive(Debug, Default)]
pub struct SupervisorState {
    handles: Vec<ChildHandle>,
}

impl SupervisorState {
    pub fn handles(&self) -> &[ChildHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Only the first launched child is watched, later children are not noticed until shutdown
    async fn await_first_exit(&mut self) -> Result<(usize, ExitStatus), Error> {
        let primary = self.handles.first_mut().ok_or(ErrorKind::NoChildren)?;
        let status = primary.wait().await?;

        warn!("{} ({}) exited: {}", primary.name(), primary.pid(), status);
        Ok((0, status))
    }

    /// Visits every child, last launched first. Returns how many leaders were still alive.
    ///
    /// The forced phase kills the group even when its leader is gone, members of the group may
    ///   have outlived it.
    fn signal_all(&mut self, phase: Phase, report: &mut ShutdownReport) -> usize {
        let mut alive = 0;

        for (index, handle) in self.handles.iter_mut().enumerate().rev() {
            let outcome = if handle.is_alive() {
                alive += 1;
                deliver(phase, handle)
            } else if phase == Phase::Forced {
                deliver(phase, handle)
            } else {
                debug!("{} ({}) already exited", handle.name(), handle.pid());
                Outcome::AlreadyExited
            };

            report.visits.push(Visit {
                phase,
                index,
                name: handle.name().to_string(),
                outcome,
            });
        }

        alive
    }

    /// Collects the exit status of everything killed, each wait bounded by `limit`
    async fn reap(&mut self, limit: Duration) {
        for handle in self.handles.iter_mut().rev() {
            if handle.exit_status().is_some() {
                continue;
            }

            let (name, pid) = (handle.name().to_string(), handle.pid());
            match time::timeout(limit, handle.wait()).await {
                Ok(Ok(status)) => debug!("{} ({}) reaped: {}", name, pid, status),
                Ok(Err(e)) => warn!("failed to reap {} ({}): {}", name, pid, e),
                Err(_) => warn!("{} ({}) still running after SIGKILL", name, pid),
            }
        }
    }
}

/// Launch and monitor a fixed set of processes
///
/// Rules:
///   - children are started in order, each leading its own process group
///   - the first child is the primary, its exit ends the run
///   - shutdown stops children in reverse launch order, SIGTERM then SIGKILL
///   - no restarts, any failure ends the run
#[derive(Debug)]
pub struct Supervisor {
    state: SupervisorState,
    grace_period: Duration,
    signals: Option<ShutdownSignals>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            state: SupervisorState::default(),
            grace_period: DEFAULT_GRACE_PERIOD,
            signals: None,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Route SIGINT and SIGTERM into `wait_for_event`, call before launching anything
    pub fn install_signal_handlers(&mut self) -> Result<(), Error> {
        if self.signals.is_none() {
            self.signals = Some(ShutdownSignals::install()?);
        }

        Ok(())
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn handles(&self) -> &[ChildHandle] {
        self.state.handles()
    }

    /// Verifies every executable and required path before anything is launched
    pub fn check_preconditions(specs: &[ChildSpec]) -> Result<(), Error> {
        for spec in specs {
            let program = spec.check()?;
            debug!("{} resolved to {}", spec.name(), program.display());
        }

        Ok(())
    }

    /// Launches each spec in order.
    ///
    /// On failure the handles launched so far are kept, the caller should `shutdown`.
    pub async fn launch_all(&mut self, specs: &[ChildSpec]) -> Result<&[ChildHandle], Error> {
        for (index, spec) in specs.iter().enumerate() {
            spec.check()?;

            let handle = fork::new_process(spec).map_err(|source| ErrorKind::Launch {
                index,
                name: spec.name().to_string(),
                source,
            })?;
            self.state.handles.push(handle);

            if let Some(delay) = spec.delay() {
                if index + 1 < specs.len() {
                    debug!("waiting {:?} after {}", delay, spec.name());
                    time::sleep(delay).await;
                }
            }
        }

        Ok(self.state.handles())
    }

    /// Blocks until the first launched child exits
    pub async fn await_first_exit(&mut self) -> Result<(usize, ExitStatus), Error> {
        self.state.await_first_exit().await
    }

    /// Blocks until the primary child exits, or a shutdown signal arrives
    pub async fn wait_for_event(&mut self) -> Result<Event, Error> {
        let Self { state, signals, .. } = self;

        select! {
            exited = state.await_first_exit().fuse() => {
                let (index, status) = exited?;
                Ok(Event::Exited { index, status })
            },
            signal = next_signal(signals).fuse() => {
                info!("received {}", signal);
                Ok(Event::Signalled(signal))
            },
        }
    }

    /// Terminates every child still alive, last launched first.
    ///
    /// Errors are logged and recorded in the report, never returned. Calling this again only
    ///   visits children that are already gone.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.state.is_empty() {
            return report;
        }

        info!("shutting down {} processes", self.state.len());
        let alive = self.state.signal_all(Phase::Graceful, &mut report);

        if alive > 0 {
            time::sleep(self.grace_period).await;
        }

        let alive = self.state.signal_all(Phase::Forced, &mut report);
        if alive > 0 {
            self.state.reap(self.grace_period).await;
        }

        report
    }

    /// The whole run: check, launch, wait, shut down.
    ///
    /// `running` is called once every child has been launched.
    pub async fn supervise<F>(&mut self, specs: &[ChildSpec], running: F) -> Result<Event, Error>
    where
        F: FnOnce(&[ChildHandle]),
    {
        Self::check_preconditions(specs)?;

        if let Err(e) = self.launch_all(specs).await {
            error!("startup failed: {}", e);
            self.shutdown().await;
            return Err(e);
        }

        running(self.handles());

        let event = self.wait_for_event().await;
        self.shutdown().await;
        event
    }
}

fn deliver(phase: Phase, handle: &ChildHandle) -> Outcome {
    match phase.deliver(handle.group()) {
        Ok(()) => {
            info!(
                "sent {} to {} ({})",
                phase.signal(),
                handle.name(),
                handle.group()
            );
            Outcome::Delivered
        }
        Err(e) if e.is_no_such_process() => {
            debug!("{} ({}) has nothing left to signal", handle.name(), handle.group());
            Outcome::AlreadyExited
        }
        Err(e) => {
            warn!("{}: {}", handle.name(), e);
            Outcome::Failed(e.to_string())
        }
    }
}

async fn next_signal(signals: &mut Option<ShutdownSignals>) -> Signal {
    match signals {
        Some(signals) => signals.recv().await,
        None => future::pending().await,
    }
}
