//! Thread-safe state registry using DashMap.
//!
//! Holds every declared state, hands out stable declaration orders and owns
//! the binding slots. The engine is the only writer of a binding; application
//! code reads through [`StateRegistry::get`] or [`StateRegistry::binding`].

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{StatelyError, StatelyResult};
use crate::lifecycle::{Lifecycle, StateContext};
use crate::state::{Binding, RunState, StateEntry, StateMetrics};
use crate::types::StateName;

/// Registry of declared states.
#[derive(Debug)]
pub struct StateRegistry {
    /// Map of state name to state entry.
    states: DashMap<StateName, StateEntry>,
    /// Last order handed out; the first declaration gets 1.
    last_order: AtomicU64,
    /// Arguments recorded by `start_with_args`, last writer wins.
    args: RwLock<Option<Vec<String>>>,
}

impl StateRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
            last_order: AtomicU64::new(0),
            args: RwLock::new(None),
        }
    }

    /// Create a registry wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Declare a state, returning its order.
    ///
    /// Redeclaring a name keeps its order and installs the new lifecycle with
    /// a fresh not-started binding. A running instance of the old declaration
    /// is stopped first on a best-effort basis.
    pub fn register(&self, name: StateName, lifecycle: Lifecycle) -> StatelyResult<u64> {
        lifecycle.validate(&name)?;

        if self.contains(&name) {
            self.cleanup_if_dirty(&name);

            let mut entry = self.entry_mut(&name)?;
            entry.lifecycle = lifecycle;
            entry.origin = None;
            entry.sub = false;
            entry.observed.clear();
            if entry.run_state != RunState::NotStarted {
                entry.reset();
            }

            tracing::info!(state = %name, order = entry.order, "Redeclared state");
            return Ok(entry.order);
        }

        let order = self.last_order.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(state = %name, order = order, "Registered state");
        self.states
            .insert(name.clone(), StateEntry::new(name, order, lifecycle));

        Ok(order)
    }

    /// Stop a live instance before its declaration is replaced.
    fn cleanup_if_dirty(&self, name: &StateName) {
        let (stop, binding) = match self.entry(name) {
            Ok(entry) if entry.run_state != RunState::NotStarted => {
                (entry.lifecycle.stop_fn().cloned(), entry.binding.clone())
            }
            _ => return,
        };

        if let Some(stop) = stop {
            let ctx = StateContext::new(self, name, binding);
            if let Err(e) = stop(&ctx) {
                tracing::warn!(
                    state = %name,
                    error = %e,
                    "Failed to stop previous instance on redeclaration"
                );
            }
        }
    }

    /// Check if a state exists.
    pub fn contains(&self, name: &StateName) -> bool {
        self.states.contains_key(name)
    }

    /// Get the number of declared states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Every declared state, by order.
    pub fn all_states(&self) -> Vec<StateName> {
        self.names_where(|_| true)
    }

    /// Declared states not currently acting as a substitute, by order.
    pub fn all_without_substitutes(&self) -> Vec<StateName> {
        self.names_where(|entry| !entry.sub)
    }

    /// Started states, by order.
    pub fn running_states(&self) -> Vec<StateName> {
        self.names_where(|entry| entry.run_state.is_started())
    }

    /// Suspended states, by order.
    pub fn suspended_states(&self) -> Vec<StateName> {
        self.names_where(|entry| entry.run_state.is_suspended())
    }

    fn names_where(&self, predicate: impl Fn(&StateEntry) -> bool) -> Vec<StateName> {
        let mut matched: Vec<(u64, StateName)> = self
            .states
            .iter()
            .filter(|r| predicate(r.value()))
            .map(|r| (r.order, r.key().clone()))
            .collect();
        matched.sort_unstable_by_key(|(order, _)| *order);
        matched.into_iter().map(|(_, name)| name).collect()
    }

    pub fn order(&self, name: &StateName) -> StatelyResult<u64> {
        Ok(self.entry(name)?.order)
    }

    pub fn run_state(&self, name: &StateName) -> StatelyResult<RunState> {
        Ok(self.entry(name)?.run_state)
    }

    /// Current binding of a state.
    pub fn binding(&self, name: &StateName) -> StatelyResult<Binding> {
        Ok(self.entry(name)?.binding.clone())
    }

    /// Current value of a state, if started or suspended and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &StateName) -> Option<Arc<T>> {
        self.entry(name).ok()?.binding.downcast::<T>()
    }

    /// Lifecycle currently installed for a state.
    pub fn lifecycle(&self, name: &StateName) -> StatelyResult<Lifecycle> {
        Ok(self.entry(name)?.lifecycle.clone())
    }

    pub fn is_substitute(&self, name: &StateName) -> StatelyResult<bool> {
        Ok(self.entry(name)?.sub)
    }

    pub fn is_substituted(&self, name: &StateName) -> StatelyResult<bool> {
        Ok(self.entry(name)?.origin.is_some())
    }

    /// Get metrics for all states, by order.
    pub fn metrics(&self) -> Vec<StateMetrics> {
        let mut metrics: Vec<StateMetrics> = self
            .states
            .iter()
            .map(|r| StateMetrics::from(r.value()))
            .collect();
        metrics.sort_unstable_by_key(|m| m.order);
        metrics
    }

    /// Arguments stored by the last `start_with_args`, `None` if never set.
    pub fn args(&self) -> Option<Vec<String>> {
        self.args.read().clone()
    }

    pub(crate) fn set_args(&self, args: Vec<String>) {
        *self.args.write() = Some(args);
    }

    pub(crate) fn entry(&self, name: &StateName) -> StatelyResult<Ref<'_, StateName, StateEntry>> {
        self.states
            .get(name)
            .ok_or_else(|| StatelyError::StateNotFound(name.clone()))
    }

    pub(crate) fn entry_mut(
        &self,
        name: &StateName,
    ) -> StatelyResult<RefMut<'_, StateName, StateEntry>> {
        self.states
            .get_mut(name)
            .ok_or_else(|| StatelyError::StateNotFound(name.clone()))
    }

    /// Visit every entry; no lifecycle code may run inside `f`.
    pub(crate) fn for_each_entry(&self, mut f: impl FnMut(&StateEntry)) {
        for r in self.states.iter() {
            f(r.value());
        }
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
