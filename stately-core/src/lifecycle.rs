// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lifecycle declarations and the context handed to lifecycle callbacks.
//!
//! A [`Lifecycle`] is the capability set of a state: a required `start`,
//! plus optional `stop`, `suspend` and `resume`. Callbacks never receive raw
//! globals; they read their own binding and other states through a
//! [`StateContext`], which records every cross-state read as an observed
//! dependency edge.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{LifecycleError, LifecycleValidationError};
use crate::registry::StateRegistry;
use crate::state::Binding;
use crate::types::{Instance, StateName};

/// Callback producing an instance value (start, suspend, resume).
pub type ProduceFn =
    Arc<dyn Fn(&StateContext<'_>) -> Result<Instance, LifecycleError> + Send + Sync>;

/// Teardown callback; only its failure is observed.
pub type StopFn = Arc<dyn Fn(&StateContext<'_>) -> Result<(), LifecycleError> + Send + Sync>;

/// Lifecycle functions of a state.
///
/// Cloning is cheap: callbacks are reference counted, which is also what
/// lets substitution snapshot and restore them exactly.
#[derive(Clone, Default)]
pub struct Lifecycle {
    start: Option<ProduceFn>,
    stop: Option<StopFn>,
    suspend: Option<ProduceFn>,
    resume: Option<ProduceFn>,
    uses: BTreeSet<StateName>,
}

impl Lifecycle {
    /// Create an empty lifecycle. `start` must be set before registration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the start function.
    pub fn start<T, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&StateContext<'_>) -> Result<T, LifecycleError> + Send + Sync + 'static,
    {
        self.start_instance(wrap(f))
    }

    /// Set a start function that returns an already type-erased instance.
    pub fn start_instance<F>(mut self, f: F) -> Self
    where
        F: Fn(&StateContext<'_>) -> Result<Instance, LifecycleError> + Send + Sync + 'static,
    {
        let f: ProduceFn = Arc::new(f);
        self.start = Some(f);
        self
    }

    /// Set the stop function.
    pub fn stop<F>(mut self, f: F) -> Self
    where
        F: Fn(&StateContext<'_>) -> Result<(), LifecycleError> + Send + Sync + 'static,
    {
        let f: StopFn = Arc::new(f);
        self.stop = Some(f);
        self
    }

    /// Set the suspend function, producing the paused representation.
    pub fn suspend<T, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&StateContext<'_>) -> Result<T, LifecycleError> + Send + Sync + 'static,
    {
        self.suspend_instance(wrap(f))
    }

    pub fn suspend_instance<F>(mut self, f: F) -> Self
    where
        F: Fn(&StateContext<'_>) -> Result<Instance, LifecycleError> + Send + Sync + 'static,
    {
        let f: ProduceFn = Arc::new(f);
        self.suspend = Some(f);
        self
    }

    /// Set the resume function, producing a live instance from a paused one.
    pub fn resume<T, F>(self, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&StateContext<'_>) -> Result<T, LifecycleError> + Send + Sync + 'static,
    {
        self.resume_instance(wrap(f))
    }

    pub fn resume_instance<F>(mut self, f: F) -> Self
    where
        F: Fn(&StateContext<'_>) -> Result<Instance, LifecycleError> + Send + Sync + 'static,
    {
        let f: ProduceFn = Arc::new(f);
        self.resume = Some(f);
        self
    }

    /// Declare a dependency hint on another state.
    ///
    /// Hints only feed the dependency report; batches are always ordered by
    /// declaration order.
    pub fn uses(mut self, other: StateName) -> Self {
        self.uses.insert(other);
        self
    }

    /// Lifecycle that yields a clone of `value` on start and has no stop.
    pub fn constant(value: Instance) -> Self {
        Self::new().start_instance(move |_| Ok(Arc::clone(&value)))
    }

    /// Reject malformed declarations.
    pub fn validate(&self, name: &StateName) -> Result<(), LifecycleValidationError> {
        if self.start.is_none() {
            return Err(LifecycleValidationError::MissingStart { name: name.clone() });
        }
        if self.suspend.is_some() && self.resume.is_none() {
            return Err(LifecycleValidationError::SuspendWithoutResume { name: name.clone() });
        }
        Ok(())
    }

    pub fn has_stop(&self) -> bool {
        self.stop.is_some()
    }

    pub fn has_suspend(&self) -> bool {
        self.suspend.is_some()
    }

    pub fn has_resume(&self) -> bool {
        self.resume.is_some()
    }

    /// Declared dependency hints.
    pub fn declared_uses(&self) -> &BTreeSet<StateName> {
        &self.uses
    }

    /// True when both lifecycles share the exact same callbacks.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        fn same<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.start, &other.start)
            && same(&self.stop, &other.stop)
            && same(&self.suspend, &other.suspend)
            && same(&self.resume, &other.resume)
    }

    pub(crate) fn start_fn(&self) -> Option<&ProduceFn> {
        self.start.as_ref()
    }

    pub(crate) fn stop_fn(&self) -> Option<&StopFn> {
        self.stop.as_ref()
    }

    pub(crate) fn suspend_fn(&self) -> Option<&ProduceFn> {
        self.suspend.as_ref()
    }

    pub(crate) fn resume_fn(&self) -> Option<&ProduceFn> {
        self.resume.as_ref()
    }
}

fn wrap<T, F>(
    f: F,
) -> impl Fn(&StateContext<'_>) -> Result<Instance, LifecycleError> + Send + Sync + 'static
where
    T: Any + Send + Sync,
    F: Fn(&StateContext<'_>) -> Result<T, LifecycleError> + Send + Sync + 'static,
{
    move |ctx: &StateContext<'_>| f(ctx).map(|value| Arc::new(value) as Instance)
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("suspend", &self.suspend.is_some())
            .field("resume", &self.resume.is_some())
            .field("uses", &self.uses)
            .finish()
    }
}

/// View of the engine handed to a lifecycle callback.
pub struct StateContext<'a> {
    registry: &'a StateRegistry,
    name: &'a StateName,
    current: Binding,
    observed: RefCell<BTreeSet<StateName>>,
}

impl<'a> StateContext<'a> {
    pub(crate) fn new(registry: &'a StateRegistry, name: &'a StateName, current: Binding) -> Self {
        Self {
            registry,
            name,
            current,
            observed: RefCell::new(BTreeSet::new()),
        }
    }

    /// Name of the state being transitioned.
    pub fn name(&self) -> &StateName {
        self.name
    }

    /// The state's binding at the moment the transition began.
    pub fn binding(&self) -> &Binding {
        &self.current
    }

    /// Current value of this state, if bound and of type `T`.
    pub fn current<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.current.downcast::<T>()
    }

    pub fn current_instance(&self) -> Option<Instance> {
        self.current.instance().cloned()
    }

    /// Current value of another state, recorded as a dependency.
    pub fn get<T: Any + Send + Sync>(&self, other: &StateName) -> Option<Arc<T>> {
        self.get_instance(other)?.downcast::<T>().ok()
    }

    pub fn get_instance(&self, other: &StateName) -> Option<Instance> {
        if other != self.name {
            self.observed.borrow_mut().insert(other.clone());
        }
        self.registry.binding(other).ok()?.instance().cloned()
    }

    /// Arguments stored by the last `start_with_args`.
    pub fn args(&self) -> Option<Vec<String>> {
        self.registry.args()
    }

    pub(crate) fn into_observed(self) -> BTreeSet<StateName> {
        self.observed.into_inner()
    }
}
