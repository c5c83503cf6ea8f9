// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Substitution and rollback of lifecycles.
//!
//! A substituted state keeps its name, order and binding slot but runs the
//! replacement's lifecycle functions until it is rolled back. The original
//! lifecycle is kept as the entry's origin. A second substitution of the same
//! target swaps the active lifecycle again but keeps the first origin, so a
//! single rollback always restores the declared lifecycle.
//!
//! A suspended replacement hands its paused value to a target that is not
//! started, so the target resumes from it. Dependencies observed while the
//! replacement ran are dropped on rollback.

use std::fmt;

use crate::error::{StatelyError, StatelyResult};
use crate::lifecycle::Lifecycle;
use crate::registry::StateRegistry;
use crate::state::{Binding, RunState};
use crate::types::{Instance, StateName};

/// What to run in place of a declared state.
#[derive(Clone)]
pub enum Replacement {
    /// Another declared state, flagged as a substitute while in use.
    State(StateName),
    /// An anonymous lifecycle, typically a test double.
    Lifecycle(Lifecycle),
    /// A constant value bound on start, with no stop.
    Value(Instance),
}

impl fmt::Debug for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(name) => f.debug_tuple("State").field(name).finish(),
            Self::Lifecycle(lifecycle) => f.debug_tuple("Lifecycle").field(lifecycle).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl StateRegistry {
    /// Run `replacement`'s lifecycle under `target`'s name until rollback.
    pub fn substitute(&self, target: &StateName, replacement: Replacement) -> StatelyResult<()> {
        let (lifecycle, paused): (Lifecycle, Option<Binding>) = match replacement {
            Replacement::State(other) => {
                if &other == target {
                    return Err(StatelyError::InvalidSubstitution {
                        target: target.clone(),
                        reason: "a state cannot substitute itself".to_string(),
                    });
                }
                // Resolve the target before flagging anything.
                self.entry(target)?;

                let mut sub = self.entry_mut(&other)?;
                sub.sub = true;
                let paused = sub.run_state.is_suspended().then(|| sub.binding.clone());
                (sub.lifecycle.clone(), paused)
            }
            Replacement::Lifecycle(lifecycle) => {
                lifecycle.validate(target)?;
                (lifecycle, None)
            }
            Replacement::Value(value) => (Lifecycle::constant(value), None),
        };

        let mut entry = self.entry_mut(target)?;
        if entry.origin.is_none() {
            entry.origin = Some(entry.lifecycle.clone());
        } else {
            tracing::warn!(
                state = %target,
                "State already substituted; keeping its declared lifecycle for rollback"
            );
        }
        entry.lifecycle = lifecycle;
        if let Some(binding) = paused {
            if entry.run_state == RunState::NotStarted {
                entry.settle(RunState::Suspended, binding);
            }
        }

        tracing::info!(state = %target, "Substituted state lifecycle");
        Ok(())
    }

    /// Restore the declared lifecycle. Returns false if never substituted.
    pub fn rollback(&self, name: &StateName) -> StatelyResult<bool> {
        let mut entry = self.entry_mut(name)?;
        match entry.origin.take() {
            Some(origin) => {
                entry.lifecycle = origin;
                entry.observed.clear();
                tracing::info!(state = %name, "Rolled back substitution");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release a state from substitute duty.
    ///
    /// Clears the substitute flag and forces it to not-started without
    /// running its stop function. Its instance, live or paused, belongs to
    /// the state it stood in for.
    pub fn unsubstitute(&self, name: &StateName) -> StatelyResult<bool> {
        let mut entry = self.entry_mut(name)?;
        if !entry.sub {
            return Ok(false);
        }
        entry.sub = false;
        if entry.run_state != RunState::NotStarted {
            entry.reset();
        }
        Ok(true)
    }
}
