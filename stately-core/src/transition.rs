// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Transition engine.
//!
//! The four primitive transitions and `bring`, which applies one of them to a
//! batch of states in declaration order. A transition whose precondition does
//! not hold is a silent no-op. Lifecycle callbacks run with no registry lock
//! held, so they may read other states.
//!
//! | Transition | Precondition               | Result                  |
//! |------------|----------------------------|-------------------------|
//! | `Up`       | not started                | Started                 |
//! | `Down`     | started or suspended       | NotStarted              |
//! | `Sigstop`  | started, resume present    | Suspended               |
//! | `Sigcont`  | bound (else error), paused | Started                 |

use std::collections::HashSet;

use crate::error::{LifecycleValidationError, StatelyResult, TransitionError};
use crate::lifecycle::{Lifecycle, StateContext};
use crate::registry::StateRegistry;
use crate::state::{Binding, RunState};
use crate::types::StateName;

/// Direction in which a batch walks declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lowest order first: start and resume.
    Ascending,
    /// Highest order first: stop.
    Descending,
}

/// Primitive transition applied to a single state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start, or resume a suspended state.
    Up,
    /// Stop.
    Down,
    /// Suspend.
    Sigstop,
    /// Resume.
    Sigcont,
}

impl Transition {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Sigstop => "sigstop",
            Self::Sigcont => "sigcont",
        }
    }

    /// Apply to one state. Returns whether the state changed.
    pub fn apply(self, registry: &StateRegistry, name: &StateName) -> StatelyResult<bool> {
        let snapshot = Snapshot::take(registry, name)?;
        match self {
            Self::Up => up(registry, name, snapshot),
            Self::Down => down(registry, name, snapshot),
            Self::Sigstop => sigstop(registry, name, snapshot),
            Self::Sigcont => sigcont(registry, name, snapshot),
        }
    }
}

/// Apply `transition` to `states` one at a time, sorted by order.
///
/// Unknown names fail before anything runs. The first failing transition
/// aborts the batch; states already visited keep their new run state.
/// Returns the states that changed, in application order.
pub fn bring(
    registry: &StateRegistry,
    states: &[StateName],
    transition: Transition,
    direction: Direction,
) -> StatelyResult<Vec<StateName>> {
    let mut seen = HashSet::with_capacity(states.len());
    let mut batch = Vec::with_capacity(states.len());
    for name in states {
        if seen.insert(name) {
            batch.push((registry.order(name)?, name));
        }
    }

    match direction {
        Direction::Ascending => batch.sort_unstable_by_key(|(order, _)| *order),
        Direction::Descending => batch.sort_unstable_by(|(a, _), (b, _)| b.cmp(a)),
    }

    tracing::debug!(
        transition = transition.name(),
        states = batch.len(),
        "Bringing batch"
    );

    let mut changed = Vec::with_capacity(batch.len());
    for (_, name) in batch {
        if transition.apply(registry, name)? {
            changed.push(name.clone());
        }
    }
    Ok(changed)
}

/// Everything a transition needs, copied out so no lock is held while
/// lifecycle code runs.
struct Snapshot {
    lifecycle: Lifecycle,
    run_state: RunState,
    binding: Binding,
}

impl Snapshot {
    fn take(registry: &StateRegistry, name: &StateName) -> StatelyResult<Self> {
        let entry = registry.entry(name)?;
        Ok(Self {
            lifecycle: entry.lifecycle.clone(),
            run_state: entry.run_state,
            binding: entry.binding.clone(),
        })
    }
}

fn up(registry: &StateRegistry, name: &StateName, snap: Snapshot) -> StatelyResult<bool> {
    if snap.run_state.is_started() {
        return Ok(false);
    }

    let resuming = snap.run_state.is_suspended() && snap.lifecycle.has_resume();
    let produce = if resuming {
        snap.lifecycle.resume_fn()
    } else {
        snap.lifecycle.start_fn()
    }
    .ok_or_else(|| LifecycleValidationError::MissingStart { name: name.clone() })?;

    let ctx = StateContext::new(registry, name, snap.binding);
    let result = produce(&ctx);
    let observed = ctx.into_observed();

    let mut entry = registry.entry_mut(name)?;
    entry.observed.extend(observed);
    let value = result.map_err(|source| TransitionError::StartFailure {
        name: name.clone(),
        source,
    })?;
    entry.settle(RunState::Started, Binding::Value(value));
    Ok(true)
}

fn down(registry: &StateRegistry, name: &StateName, snap: Snapshot) -> StatelyResult<bool> {
    if snap.run_state == RunState::NotStarted {
        return Ok(false);
    }

    let result = match snap.lifecycle.stop_fn() {
        Some(stop) => {
            let ctx = StateContext::new(registry, name, snap.binding);
            let result = stop(&ctx);
            registry.entry_mut(name)?.observed.extend(ctx.into_observed());
            result
        }
        None => Ok(()),
    };

    // The slot is reset even when stop fails, so a retry does not find a
    // state that can never be stopped.
    registry.entry_mut(name)?.reset();

    result.map_err(|source| TransitionError::StopFailure {
        name: name.clone(),
        source,
    })?;
    Ok(true)
}

fn sigstop(registry: &StateRegistry, name: &StateName, snap: Snapshot) -> StatelyResult<bool> {
    if !snap.run_state.is_started() || !snap.lifecycle.has_resume() {
        return Ok(false);
    }

    let binding = match snap.lifecycle.suspend_fn() {
        Some(suspend) => {
            let ctx = StateContext::new(registry, name, snap.binding);
            let result = suspend(&ctx);
            registry.entry_mut(name)?.observed.extend(ctx.into_observed());
            let paused = result.map_err(|source| TransitionError::SuspendFailure {
                name: name.clone(),
                source,
            })?;
            Binding::Value(paused)
        }
        None => snap.binding,
    };

    registry.entry_mut(name)?.settle(RunState::Suspended, binding);
    Ok(true)
}

fn sigcont(registry: &StateRegistry, name: &StateName, snap: Snapshot) -> StatelyResult<bool> {
    if snap.binding.is_not_started() {
        return Err(TransitionError::ResumeOnStopped { name: name.clone() }.into());
    }
    if !snap.run_state.is_suspended() {
        return Ok(false);
    }

    let binding = match snap.lifecycle.resume_fn() {
        Some(resume) => {
            let ctx = StateContext::new(registry, name, snap.binding);
            let result = resume(&ctx);
            registry.entry_mut(name)?.observed.extend(ctx.into_observed());
            let value = result.map_err(|source| TransitionError::ResumeFailure {
                name: name.clone(),
                source,
            })?;
            Binding::Value(value)
        }
        None => snap.binding,
    };

    registry.entry_mut(name)?.settle(RunState::Started, binding);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatelyError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn name(s: &str) -> StateName {
        StateName::new(s).unwrap()
    }

    #[derive(Debug, PartialEq)]
    struct Conn {
        url: String,
    }

    #[derive(Debug)]
    struct PausedConn {
        url: String,
    }

    fn conn_lifecycle() -> Lifecycle {
        Lifecycle::new()
            .start(|_| {
                Ok(Conn {
                    url: "db://local".into(),
                })
            })
            .suspend(|ctx| {
                let conn = ctx.current::<Conn>().ok_or("no connection bound")?;
                Ok(PausedConn {
                    url: conn.url.clone(),
                })
            })
            .resume(|ctx| {
                let paused = ctx.current::<PausedConn>().ok_or("not paused")?;
                Ok(Conn {
                    url: paused.url.clone(),
                })
            })
    }

    #[test]
    fn test_up_binds_value() {
        let registry = StateRegistry::new();
        registry.register(name("db"), conn_lifecycle()).unwrap();

        assert!(Transition::Up.apply(&registry, &name("db")).unwrap());
        assert_eq!(registry.run_state(&name("db")).unwrap(), RunState::Started);
        assert_eq!(
            registry.get::<Conn>(&name("db")).unwrap().url,
            "db://local"
        );
    }

    #[test]
    fn test_up_is_idempotent() {
        let registry = StateRegistry::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&starts);
        registry
            .register(
                name("db"),
                Lifecycle::new().start(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst))),
            )
            .unwrap();

        assert!(Transition::Up.apply(&registry, &name("db")).unwrap());
        let first = registry.get::<usize>(&name("db")).unwrap();
        assert!(!Transition::Up.apply(&registry, &name("db")).unwrap());

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(
            &first,
            &registry.get::<usize>(&name("db")).unwrap()
        ));
    }

    #[test]
    fn test_down_without_stop_fn() {
        let registry = StateRegistry::new();
        registry
            .register(name("db"), Lifecycle::new().start(|_| Ok(1u8)))
            .unwrap();

        assert!(!Transition::Down.apply(&registry, &name("db")).unwrap());
        Transition::Up.apply(&registry, &name("db")).unwrap();
        assert!(Transition::Down.apply(&registry, &name("db")).unwrap());
        assert!(registry.binding(&name("db")).unwrap().is_not_started());
    }

    #[test]
    fn test_failed_stop_still_resets_slot() {
        let registry = StateRegistry::new();
        registry
            .register(
                name("db"),
                Lifecycle::new()
                    .start(|_| Ok(1u8))
                    .stop(|_| Err("socket already closed".into())),
            )
            .unwrap();
        Transition::Up.apply(&registry, &name("db")).unwrap();

        let err = Transition::Down.apply(&registry, &name("db")).unwrap_err();
        assert!(matches!(
            err,
            StatelyError::Transition(TransitionError::StopFailure { .. })
        ));
        assert_eq!(registry.run_state(&name("db")).unwrap(), RunState::NotStarted);
        assert!(registry.binding(&name("db")).unwrap().is_not_started());
    }

    #[test]
    fn test_suspend_resume_round_trip() {
        let registry = StateRegistry::new();
        registry.register(name("db"), conn_lifecycle()).unwrap();
        Transition::Up.apply(&registry, &name("db")).unwrap();

        assert!(Transition::Sigstop.apply(&registry, &name("db")).unwrap());
        assert_eq!(registry.run_state(&name("db")).unwrap(), RunState::Suspended);
        assert!(registry.get::<PausedConn>(&name("db")).is_some());
        assert!(registry.get::<Conn>(&name("db")).is_none());

        assert!(Transition::Sigcont.apply(&registry, &name("db")).unwrap());
        assert_eq!(registry.run_state(&name("db")).unwrap(), RunState::Started);
        assert_eq!(
            *registry.get::<Conn>(&name("db")).unwrap(),
            Conn {
                url: "db://local".into()
            }
        );
    }

    #[test]
    fn test_up_resumes_suspended_state() {
        let registry = StateRegistry::new();
        registry.register(name("db"), conn_lifecycle()).unwrap();
        Transition::Up.apply(&registry, &name("db")).unwrap();
        Transition::Sigstop.apply(&registry, &name("db")).unwrap();

        assert!(Transition::Up.apply(&registry, &name("db")).unwrap());
        assert!(registry.get::<Conn>(&name("db")).is_some());
    }

    #[test]
    fn test_sigstop_requires_resume() {
        let registry = StateRegistry::new();
        registry
            .register(name("db"), Lifecycle::new().start(|_| Ok(1u8)))
            .unwrap();
        Transition::Up.apply(&registry, &name("db")).unwrap();

        assert!(!Transition::Sigstop.apply(&registry, &name("db")).unwrap());
        assert_eq!(registry.run_state(&name("db")).unwrap(), RunState::Started);
    }

    #[test]
    fn test_sigstop_without_suspend_keeps_value() {
        let registry = StateRegistry::new();
        registry
            .register(
                name("db"),
                Lifecycle::new().start(|_| Ok(9u8)).resume(|_| Ok(10u8)),
            )
            .unwrap();
        Transition::Up.apply(&registry, &name("db")).unwrap();

        assert!(Transition::Sigstop.apply(&registry, &name("db")).unwrap());
        assert_eq!(registry.run_state(&name("db")).unwrap(), RunState::Suspended);
        assert_eq!(registry.get::<u8>(&name("db")).as_deref(), Some(&9));

        Transition::Sigcont.apply(&registry, &name("db")).unwrap();
        assert_eq!(registry.get::<u8>(&name("db")).as_deref(), Some(&10));
    }

    #[test]
    fn test_sigcont_on_not_started_fails() {
        let registry = StateRegistry::new();
        registry.register(name("db"), conn_lifecycle()).unwrap();

        let err = Transition::Sigcont.apply(&registry, &name("db")).unwrap_err();
        assert!(matches!(
            err,
            StatelyError::Transition(TransitionError::ResumeOnStopped { .. })
        ));
    }

    #[test]
    fn test_sigcont_on_started_is_noop() {
        let registry = StateRegistry::new();
        registry.register(name("db"), conn_lifecycle()).unwrap();
        Transition::Up.apply(&registry, &name("db")).unwrap();

        assert!(!Transition::Sigcont.apply(&registry, &name("db")).unwrap());
    }

    #[test]
    fn test_bring_orders_batch() {
        let registry = StateRegistry::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for s in ["p", "q", "r"] {
            let log = Arc::clone(&log);
            registry
                .register(
                    name(s),
                    Lifecycle::new().start(move |ctx| {
                        log.lock().push(ctx.name().to_string());
                        Ok(())
                    }),
                )
                .unwrap();
        }

        let changed = bring(
            &registry,
            &[name("r"), name("p"), name("q"), name("p")],
            Transition::Up,
            Direction::Ascending,
        )
        .unwrap();
        assert_eq!(changed, vec![name("p"), name("q"), name("r")]);
        assert_eq!(*log.lock(), vec!["p", "q", "r"]);

        let stopped = bring(
            &registry,
            &registry.all_states(),
            Transition::Down,
            Direction::Descending,
        )
        .unwrap();
        assert_eq!(stopped, vec![name("r"), name("q"), name("p")]);
    }

    #[test]
    fn test_bring_rejects_unknown_state_before_running() {
        let registry = StateRegistry::new();
        registry
            .register(name("p"), Lifecycle::new().start(|_| Ok(())))
            .unwrap();

        let err = bring(
            &registry,
            &[name("p"), name("ghost")],
            Transition::Up,
            Direction::Ascending,
        )
        .unwrap_err();
        assert!(matches!(err, StatelyError::StateNotFound(_)));
        assert_eq!(registry.run_state(&name("p")).unwrap(), RunState::NotStarted);
    }

    #[test]
    fn test_context_reads_are_recorded() {
        let registry = StateRegistry::new();
        registry
            .register(name("config"), Lifecycle::new().start(|_| Ok(8080u16)))
            .unwrap();
        let config = name("config");
        registry
            .register(
                name("server"),
                Lifecycle::new().start(move |ctx| {
                    let port = ctx.get::<u16>(&config).ok_or("config not started")?;
                    Ok(format!("listening on {}", port))
                }),
            )
            .unwrap();

        Transition::Up.apply(&registry, &name("config")).unwrap();
        Transition::Up.apply(&registry, &name("server")).unwrap();

        let report = registry.states_with_dependencies();
        assert!(report[1].depends_on.contains(&name("config")));
        assert_eq!(
            registry.get::<String>(&name("server")).as_deref().map(String::as_str),
            Some("listening on 8080")
        );
    }
}
