// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stately graph` command - Dependency report for a manifest.
//!
//! Nothing is started; only declared `uses` edges are shown.

use serde::Serialize;

use stately_core::{ManifestLoader, OrderingConflict, StateRegistry, StateReport};

#[derive(Debug, Serialize)]
struct GraphReport {
    states: Vec<StateReport>,
    conflicts: Vec<OrderingConflict>,
}

pub async fn execute(manifest_path: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = ManifestLoader::load_file(manifest_path)?;
    let registry = StateRegistry::new();
    manifest.register_all(&registry)?;

    let report = GraphReport {
        states: registry.states_with_dependencies(),
        conflicts: registry.ordering_conflicts(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Dependencies (start order):");
    for state in &report.states {
        if state.depends_on.is_empty() {
            println!("  {:>3}. {}", state.order, state.name);
        } else {
            let deps: Vec<&str> = state.depends_on.iter().map(|d| d.as_str()).collect();
            println!("  {:>3}. {} → {}", state.order, state.name, deps.join(", "));
        }
    }

    if report.conflicts.is_empty() {
        println!();
        println!("✓ No ordering conflicts");
    } else {
        println!();
        println!("⚠ Ordering conflicts ({}):", report.conflicts.len());
        for conflict in &report.conflicts {
            println!(
                "  {} (order {}) uses {} (order {}), which starts later",
                conflict.depender,
                conflict.depender_order,
                conflict.dependee,
                conflict.dependee_order
            );
        }
    }

    Ok(())
}
