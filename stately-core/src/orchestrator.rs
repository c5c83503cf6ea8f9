// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Public orchestration operations.
//!
//! Every operation resolves a target set (explicit, or a default derived from
//! the registry), then brings it through one transition sequentially on the
//! calling thread. Callers must serialise operations against one registry.
//! A failure aborts the batch where it happened: query run states to see how
//! far it got.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::StatelyResult;
use crate::plan::StartPlan;
use crate::registry::StateRegistry;
use crate::substitute::Replacement;
use crate::transition::{bring, Direction, Transition};
use crate::types::StateName;

/// Result of an orchestration call: the states that actually changed, in
/// the order they were transitioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started(Vec<StateName>),
    Stopped(Vec<StateName>),
    Suspended(Vec<StateName>),
    Resumed(Vec<StateName>),
}

impl Outcome {
    pub fn states(&self) -> &[StateName] {
        match self {
            Self::Started(states)
            | Self::Stopped(states)
            | Self::Suspended(states)
            | Self::Resumed(states) => states,
        }
    }
}

/// Drives batches of states through lifecycle transitions.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<StateRegistry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<StateRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<StateRegistry> {
        &self.registry
    }

    /// Start every state that is not acting as a substitute.
    pub fn start(&self) -> StatelyResult<Outcome> {
        self.start_states(&self.registry.all_without_substitutes())
    }

    /// Start the given states, lowest order first.
    pub fn start_states(&self, states: &[StateName]) -> StatelyResult<Outcome> {
        let started = bring(&self.registry, states, Transition::Up, Direction::Ascending)?;
        tracing::info!(count = started.len(), "Started states");
        Ok(Outcome::Started(started))
    }

    /// Stop every declared state, substitutes included.
    pub fn stop(&self) -> StatelyResult<Outcome> {
        self.stop_states(&self.registry.all_states())
    }

    /// Stop the given states, highest order first.
    ///
    /// Substitute flags on the set are cleared before stopping and
    /// substituted lifecycles are rolled back afterwards.
    pub fn stop_states(&self, states: &[StateName]) -> StatelyResult<Outcome> {
        for name in states {
            self.registry.order(name)?;
        }
        for name in states {
            self.registry.unsubstitute(name)?;
        }
        let stopped = bring(&self.registry, states, Transition::Down, Direction::Descending)?;
        for name in states {
            self.registry.rollback(name)?;
        }
        tracing::info!(count = stopped.len(), "Stopped states");
        Ok(Outcome::Stopped(stopped))
    }

    /// Stop every declared state except `exclude`.
    pub fn stop_except(&self, exclude: &[StateName]) -> StatelyResult<Outcome> {
        let targets = self.resolve_except(self.registry.all_states(), exclude)?;
        self.stop_states(&targets)
    }

    /// Suspend every state that is not acting as a substitute.
    pub fn suspend(&self) -> StatelyResult<Outcome> {
        self.suspend_states(&self.registry.all_without_substitutes())
    }

    pub fn suspend_states(&self, states: &[StateName]) -> StatelyResult<Outcome> {
        let suspended = bring(&self.registry, states, Transition::Sigstop, Direction::Ascending)?;
        tracing::info!(count = suspended.len(), "Suspended states");
        Ok(Outcome::Suspended(suspended))
    }

    /// Resume every state that is not acting as a substitute.
    ///
    /// Fails with `ResumeOnStopped` on the first state that was never started.
    pub fn resume(&self) -> StatelyResult<Outcome> {
        self.resume_states(&self.registry.all_without_substitutes())
    }

    /// Resume only the states that are currently suspended.
    pub fn resume_suspended(&self) -> StatelyResult<Outcome> {
        self.resume_states(&self.registry.suspended_states())
    }

    pub fn resume_states(&self, states: &[StateName]) -> StatelyResult<Outcome> {
        let resumed = bring(&self.registry, states, Transition::Sigcont, Direction::Ascending)?;
        tracing::info!(count = resumed.len(), "Resumed states");
        Ok(Outcome::Resumed(resumed))
    }

    /// Substitute each pair, then start all non-substitute states.
    pub fn start_with<I>(&self, pairs: I) -> StatelyResult<Outcome>
    where
        I: IntoIterator<Item = (StateName, Replacement)>,
    {
        for (target, replacement) in pairs {
            self.registry.substitute(&target, replacement)?;
        }
        self.start()
    }

    /// Start all non-substitute states except `exclude`.
    pub fn start_without(&self, exclude: &[StateName]) -> StatelyResult<Outcome> {
        let targets = self.resolve_except(self.registry.all_without_substitutes(), exclude)?;
        self.start_states(&targets)
    }

    /// Record `args`, then start all non-substitute states.
    pub fn start_with_args(&self, args: Vec<String>) -> StatelyResult<Outcome> {
        self.registry.set_args(args);
        self.start()
    }

    /// Record `args`, then start the given states.
    pub fn start_states_with_args(
        &self,
        args: Vec<String>,
        states: &[StateName],
    ) -> StatelyResult<Outcome> {
        self.registry.set_args(args);
        self.start_states(states)
    }

    /// Arguments recorded by the last `start_with_args`.
    pub fn args(&self) -> Option<Vec<String>> {
        self.registry.args()
    }

    /// Begin a composable start.
    pub fn plan(&self) -> StartPlan<'_> {
        StartPlan::new(self)
    }

    fn resolve_except(
        &self,
        candidates: Vec<StateName>,
        exclude: &[StateName],
    ) -> StatelyResult<Vec<StateName>> {
        for name in exclude {
            self.registry.order(name)?;
        }
        let exclude: HashSet<&StateName> = exclude.iter().collect();
        Ok(candidates
            .into_iter()
            .filter(|name| !exclude.contains(name))
            .collect())
    }
}
