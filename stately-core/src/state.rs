// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-state records: run state, binding slot and substitution bookkeeping.
//!
//! Implements the state lifecycle: NotStarted → Started ⇄ Suspended → NotStarted.
//! A single [`RunState`] replaces separate started/suspended flags, so the
//! two can never be true at once.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::lifecycle::Lifecycle;
use crate::types::{Instance, StateName};

/// Run state of a declared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Declared, not started, or stopped.
    NotStarted,

    /// An active instance is bound.
    Started,

    /// A paused representation is bound.
    Suspended,
}

impl RunState {
    /// Get the state name for log and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Started => "Started",
            Self::Suspended => "Suspended",
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The binding slot of a state.
#[derive(Clone)]
pub enum Binding {
    /// Sentinel carrying the state's name, bound before first start and after stop.
    NotStarted(StateName),

    /// Live or paused instance produced by the latest transition.
    Value(Instance),
}

impl Binding {
    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted(_))
    }

    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Self::NotStarted(_) => None,
            Self::Value(value) => Some(value),
        }
    }

    /// Typed view of the bound value.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance()
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted(name) => f.debug_tuple("NotStarted").field(name).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted(name) => write!(f, "'{}' is not started", name),
            Self::Value(_) => f.write_str("<bound>"),
        }
    }
}

/// Registry record for one declared state.
#[derive(Debug)]
pub struct StateEntry {
    pub(crate) name: StateName,
    pub(crate) order: u64,
    pub(crate) lifecycle: Lifecycle,
    /// Pre-substitution lifecycle, present only while substituted.
    pub(crate) origin: Option<Lifecycle>,
    pub(crate) binding: Binding,
    pub(crate) run_state: RunState,
    /// Acting as a substitute for another state.
    pub(crate) sub: bool,
    pub(crate) observed: BTreeSet<StateName>,
    last_transition: Instant,
    transition_count: u64,
}

impl StateEntry {
    pub(crate) fn new(name: StateName, order: u64, lifecycle: Lifecycle) -> Self {
        Self {
            binding: Binding::NotStarted(name.clone()),
            name,
            order,
            lifecycle,
            origin: None,
            run_state: RunState::NotStarted,
            sub: false,
            observed: BTreeSet::new(),
            last_transition: Instant::now(),
            transition_count: 0,
        }
    }

    pub fn name(&self) -> &StateName {
        &self.name
    }

    pub fn order(&self) -> u64 {
        self.order
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// True while this state stands in for another one.
    pub fn is_substitute(&self) -> bool {
        self.sub
    }

    /// True while this state's own lifecycle is swapped out.
    pub fn is_substituted(&self) -> bool {
        self.origin.is_some()
    }

    /// Observed plus declared dependencies.
    pub fn dependencies(&self) -> BTreeSet<StateName> {
        self.observed
            .iter()
            .chain(self.lifecycle.declared_uses())
            .cloned()
            .collect()
    }

    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.last_transition.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Bind a new value and move to `target`.
    pub(crate) fn settle(&mut self, target: RunState, binding: Binding) {
        tracing::debug!(
            state = %self.name,
            from = self.run_state.name(),
            to = target.name(),
            "State transition"
        );

        self.binding = binding;
        self.run_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;
    }

    /// Return to the not-started sentinel.
    pub(crate) fn reset(&mut self) {
        let sentinel = Binding::NotStarted(self.name.clone());
        self.settle(RunState::NotStarted, sentinel);
    }
}

/// Metrics for one state.
#[derive(Debug, Clone, Serialize)]
pub struct StateMetrics {
    pub state: String,
    pub order: u64,
    pub run_state: String,
    pub time_in_state_ms: u64,
    pub transition_count: u64,
}

impl From<&StateEntry> for StateMetrics {
    fn from(entry: &StateEntry) -> Self {
        Self {
            state: entry.name.to_string(),
            order: entry.order,
            run_state: entry.run_state.name().to_string(),
            time_in_state_ms: entry.time_in_current_state().as_millis() as u64,
            transition_count: entry.transition_count,
        }
    }
}
