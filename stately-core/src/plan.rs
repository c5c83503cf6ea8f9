// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Composable start: pick states, swap some out, record args, start.

use crate::error::StatelyResult;
use crate::lifecycle::Lifecycle;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::substitute::Replacement;
use crate::types::{Instance, StateName};

/// Builder for a start that combines selection, substitution and args.
///
/// ```ignore
/// orchestrator
///     .plan()
///     .except([name("metrics")])
///     .swap(name("clock"), Arc::new(FixedClock::at(0)))
///     .with_args(vec!["--dry-run".into()])
///     .start()?;
/// ```
#[derive(Debug)]
pub struct StartPlan<'a> {
    orchestrator: &'a Orchestrator,
    only: Option<Vec<StateName>>,
    except: Vec<StateName>,
    swaps: Vec<(StateName, Replacement)>,
    args: Option<Vec<String>>,
}

impl<'a> StartPlan<'a> {
    pub(crate) fn new(orchestrator: &'a Orchestrator) -> Self {
        Self {
            orchestrator,
            only: None,
            except: Vec::new(),
            swaps: Vec::new(),
            args: None,
        }
    }

    /// Start only these states instead of every non-substitute state.
    pub fn only(mut self, states: impl IntoIterator<Item = StateName>) -> Self {
        self.only.get_or_insert_with(Vec::new).extend(states);
        self
    }

    /// Leave these states out.
    pub fn except(mut self, states: impl IntoIterator<Item = StateName>) -> Self {
        self.except.extend(states);
        self
    }

    /// Bind a constant value in place of `target`.
    pub fn swap(mut self, target: StateName, value: Instance) -> Self {
        self.swaps.push((target, Replacement::Value(value)));
        self
    }

    /// Run another declared state's lifecycle in place of `target`.
    pub fn swap_state(mut self, target: StateName, replacement: StateName) -> Self {
        self.swaps.push((target, Replacement::State(replacement)));
        self
    }

    /// Run an anonymous lifecycle in place of `target`.
    pub fn swap_lifecycle(mut self, target: StateName, lifecycle: Lifecycle) -> Self {
        self.swaps.push((target, Replacement::Lifecycle(lifecycle)));
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    /// Apply the plan.
    ///
    /// Every named state is checked before anything is substituted or
    /// started.
    pub fn start(self) -> StatelyResult<Outcome> {
        let registry = self.orchestrator.registry();

        let named = self
            .only
            .iter()
            .flatten()
            .chain(&self.except)
            .chain(self.swaps.iter().flat_map(|(target, replacement)| {
                let other = match replacement {
                    Replacement::State(other) => Some(other),
                    _ => None,
                };
                std::iter::once(target).chain(other)
            }));
        for name in named {
            registry.order(name)?;
        }

        for (target, replacement) in self.swaps {
            registry.substitute(&target, replacement)?;
        }

        let targets: Vec<StateName> = self
            .only
            .unwrap_or_else(|| registry.all_without_substitutes())
            .into_iter()
            .filter(|name| !self.except.contains(name))
            .collect();

        match self.args {
            Some(args) => self.orchestrator.start_states_with_args(args, &targets),
            None => self.orchestrator.start_states(&targets),
        }
    }
}
