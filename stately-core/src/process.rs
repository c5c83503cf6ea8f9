// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process-backed states.
//!
//! Starting such a state spawns a command; stopping it signals the process
//! and reaps it, escalating to SIGKILL after a timeout. Suspendable states
//! pause with SIGSTOP and resume with SIGCONT, keeping the same instance.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;

use crate::error::ProcessError;
use crate::lifecycle::{Lifecycle, StateContext};
use crate::types::StateName;

/// Interval between reap attempts while waiting for a process to exit.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How to run a process-backed state.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Pause with SIGSTOP and resume with SIGCONT.
    pub suspendable: bool,
    pub stop_signal: Signal,
    /// Grace period before SIGKILL.
    pub stop_timeout: Duration,
    /// Declared dependency hints.
    pub uses: Vec<StateName>,
}

impl ProcessSpec {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            env: HashMap::new(),
            working_dir: None,
            suspendable: false,
            stop_signal: Signal::SIGTERM,
            stop_timeout: Duration::from_secs(5),
            uses: Vec::new(),
        }
    }

    /// Command line as a single display string.
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }

    /// Build the lifecycle that runs this spec.
    pub fn into_lifecycle(self) -> Lifecycle {
        let spec = Arc::new(self);

        let start_spec = Arc::clone(&spec);
        let stop_spec = Arc::clone(&spec);
        let mut lifecycle = Lifecycle::new()
            .start(move |ctx| Ok(ManagedProcess::spawn(ctx.name(), &start_spec)?))
            .stop(move |ctx| {
                bound_process(ctx)?.terminate(stop_spec.stop_signal, stop_spec.stop_timeout)?;
                Ok(())
            });

        if spec.suspendable {
            lifecycle = lifecycle
                .suspend_instance(|ctx| {
                    bound_process(ctx)?.signal(Signal::SIGSTOP)?;
                    Ok(ctx.current_instance().ok_or_else(|| not_bound(ctx))?)
                })
                .resume_instance(|ctx| {
                    bound_process(ctx)?.signal(Signal::SIGCONT)?;
                    Ok(ctx.current_instance().ok_or_else(|| not_bound(ctx))?)
                });
        }

        for dependee in &spec.uses {
            lifecycle = lifecycle.uses(dependee.clone());
        }
        lifecycle
    }
}

fn bound_process(ctx: &StateContext<'_>) -> Result<Arc<ManagedProcess>, ProcessError> {
    ctx.current::<ManagedProcess>().ok_or_else(|| not_bound(ctx))
}

fn not_bound(ctx: &StateContext<'_>) -> ProcessError {
    ProcessError::NotBound {
        name: ctx.name().clone(),
    }
}

/// A spawned child process bound as a state's instance.
#[derive(Debug)]
pub struct ManagedProcess {
    command: String,
    pid: u32,
    child: Mutex<Child>,
}

impl ManagedProcess {
    /// Spawn the command described by `spec`.
    pub fn spawn(name: &StateName, spec: &ProcessSpec) -> Result<Self, ProcessError> {
        let command = spec.display_command();
        let (program, args) = spec
            .command
            .split_first()
            .ok_or_else(|| ProcessError::SpawnFailed {
                command: command.clone(),
                reason: "empty command".to_string(),
            })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&spec.env)
            .env("STATELY_STATE", name.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            command: command.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();

        tracing::info!(state = %name, pid = pid, command = %command, "Spawned state process");

        Ok(Self {
            command,
            pid,
            child: Mutex::new(child),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// True until the process has exited and been reaped.
    pub fn is_running(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(None))
    }

    /// Deliver a signal.
    pub fn signal(&self, sig: Signal) -> Result<(), ProcessError> {
        signal::kill(Pid::from_raw(self.pid as i32), sig).map_err(|e| ProcessError::SignalFailed {
            pid: self.pid,
            signal: sig.as_str(),
            reason: e.to_string(),
        })
    }

    /// Stop the process and reap it.
    ///
    /// Sends `sig` then SIGCONT, so a paused process can act on it, and
    /// escalates to SIGKILL once `timeout` elapses.
    pub fn terminate(&self, sig: Signal, timeout: Duration) -> Result<ExitStatus, ProcessError> {
        let mut child = self.child.lock();
        if let Some(status) = self.try_reap(&mut child)? {
            return Ok(status);
        }

        self.signal(sig)?;
        self.signal(Signal::SIGCONT)?;

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(status) = self.try_reap(&mut child)? {
                tracing::debug!(pid = self.pid, status = %status, "State process exited");
                return Ok(status);
            }
            std::thread::sleep(REAP_POLL_INTERVAL);
        }

        tracing::warn!(
            pid = self.pid,
            timeout_ms = timeout.as_millis() as u64,
            "State process ignored {}, killing",
            sig.as_str()
        );
        child.kill().map_err(|e| ProcessError::SignalFailed {
            pid: self.pid,
            signal: Signal::SIGKILL.as_str(),
            reason: e.to_string(),
        })?;
        child.wait().map_err(|e| ProcessError::WaitFailed {
            pid: self.pid,
            reason: e.to_string(),
        })
    }

    fn try_reap(&self, child: &mut Child) -> Result<Option<ExitStatus>, ProcessError> {
        child.try_wait().map_err(|e| ProcessError::WaitFailed {
            pid: self.pid,
            reason: e.to_string(),
        })
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        let child = self.child.get_mut();
        if let Ok(None) = child.try_wait() {
            tracing::warn!(pid = self.pid, "Killing orphaned state process");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Parse a signal name such as `SIGTERM` or `TERM`.
pub fn parse_signal(name: &str) -> Option<Signal> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    full.parse::<Signal>().ok()
}
