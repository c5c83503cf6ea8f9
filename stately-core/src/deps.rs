// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Read-only dependency report.
//!
//! Edges come from two places: reads of other states performed through a
//! [`StateContext`](crate::StateContext) while lifecycle code ran, and
//! `uses` hints on the declaration. They are reported only. Batches are
//! ordered by declaration order, so a dependency on a later-declared state
//! goes undetected at start time and shows up here as an
//! [`OrderingConflict`].

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::registry::StateRegistry;
use crate::state::RunState;
use crate::types::StateName;

/// One state annotated with its dependency edges.
#[derive(Debug, Clone, Serialize)]
pub struct StateReport {
    pub name: StateName,
    pub order: u64,
    pub run_state: RunState,
    pub substitute: bool,
    pub substituted: bool,
    pub depends_on: BTreeSet<StateName>,
}

/// A depender declared before the state it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderingConflict {
    pub depender: StateName,
    pub depender_order: u64,
    pub dependee: StateName,
    pub dependee_order: u64,
}

impl StateRegistry {
    /// All states with their dependency edges, by order.
    pub fn states_with_dependencies(&self) -> Vec<StateReport> {
        let mut reports = Vec::with_capacity(self.len());
        self.for_each_entry(|entry| {
            reports.push(StateReport {
                name: entry.name().clone(),
                order: entry.order(),
                run_state: entry.run_state(),
                substitute: entry.is_substitute(),
                substituted: entry.is_substituted(),
                depends_on: entry.dependencies(),
            });
        });
        reports.sort_unstable_by_key(|r| r.order);
        reports
    }

    /// Edges whose dependee would be started after its depender.
    ///
    /// Dependees that are not declared are skipped.
    pub fn ordering_conflicts(&self) -> Vec<OrderingConflict> {
        let reports = self.states_with_dependencies();
        let orders: HashMap<&StateName, u64> = reports.iter().map(|r| (&r.name, r.order)).collect();

        reports
            .iter()
            .flat_map(|r| {
                let orders = &orders;
                r.depends_on.iter().filter_map(move |dependee| {
                    let dependee_order = *orders.get(dependee)?;
                    (dependee_order > r.order).then(|| OrderingConflict {
                        depender: r.name.clone(),
                        depender_order: r.order,
                        dependee: dependee.clone(),
                        dependee_order,
                    })
                })
            })
            .collect()
    }
}
