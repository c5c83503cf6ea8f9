// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stately up` command - Start manifest states and supervise them.
//!
//! Ctrl+C stops every state. SIGUSR1 suspends suspendable states and
//! SIGUSR2 resumes whichever states are suspended.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use stately_core::{
    ManagedProcess, ManifestLoader, Orchestrator, Outcome, RunState, StateRegistry, StatelyResult,
};

use super::parse_names;

pub async fn execute(
    manifest_path: &str,
    only: Vec<String>,
    except: Vec<String>,
    args: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(manifest = %manifest_path, "Starting states");

    // Load and validate the manifest - fail fast on invalid config
    let manifest = ManifestLoader::load_file(manifest_path)?;
    let only = parse_names(&only)?;
    let except = parse_names(&except)?;

    let registry = StateRegistry::new_shared();
    manifest.register_all(&registry)?;

    for conflict in registry.ordering_conflicts() {
        tracing::warn!(
            depender = %conflict.depender,
            dependee = %conflict.dependee,
            "State uses a state declared after it; it will be started first"
        );
    }

    let orchestrator = Orchestrator::new(Arc::clone(&registry));

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    STATELY ORCHESTRATOR                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let started = {
        let orchestrator = orchestrator.clone();
        tokio::task::spawn_blocking(move || {
            let mut plan = orchestrator.plan().with_args(args).except(except);
            if !only.is_empty() {
                plan = plan.only(only);
            }
            plan.start()
        })
        .await?
    };

    match started {
        Ok(outcome) => report("Started", &outcome),
        Err(e) => {
            println!("  ✗ {}", e);
            tracing::error!(error = %e, "Start failed, stopping states that did start");
            run_blocking(&orchestrator, Orchestrator::stop).await?;
            return Err(e.into());
        }
    }

    print_status(&registry);

    println!();
    println!("Press Ctrl+C to stop (SIGUSR1 suspends, SIGUSR2 resumes)...");
    println!();

    let mut suspend_signal = signal(SignalKind::user_defined1())?;
    let mut resume_signal = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = suspend_signal.recv() => {
                match run_blocking(&orchestrator, Orchestrator::suspend).await {
                    Ok(outcome) => report("Suspended", &outcome),
                    Err(e) => tracing::error!(error = %e, "Suspend failed"),
                }
            }
            _ = resume_signal.recv() => {
                match run_blocking(&orchestrator, Orchestrator::resume_suspended).await {
                    Ok(outcome) => report("Resumed", &outcome),
                    Err(e) => tracing::error!(error = %e, "Resume failed"),
                }
            }
        }
    }

    println!();
    println!("Shutting down...");
    tracing::info!("Stopping states");

    let stopped = run_blocking(&orchestrator, Orchestrator::stop).await?;
    report("Stopped", &stopped);

    println!();
    println!("All states stopped.");
    Ok(())
}

/// Run an orchestration call off the async runtime; lifecycle code blocks.
async fn run_blocking(
    orchestrator: &Orchestrator,
    op: fn(&Orchestrator) -> StatelyResult<Outcome>,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let orchestrator = orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || op(&orchestrator)).await??;
    Ok(outcome)
}

fn report(verb: &str, outcome: &Outcome) {
    if outcome.states().is_empty() {
        println!("  {} nothing", verb);
        return;
    }
    for name in outcome.states() {
        println!("  ✓ {} {}", verb, name);
    }
}

fn print_status(registry: &StateRegistry) {
    let running = registry.running_states().len();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ Status: {:<3} states running                                  ║", running);
    println!("╠══════════════════════════════════════════════════════════════╣");

    for name in registry.all_states() {
        let state = registry.run_state(&name).unwrap_or(RunState::NotStarted);
        let status_icon = match state {
            RunState::Started => "●",
            RunState::Suspended => "◐",
            RunState::NotStarted => "○",
        };
        let pid = registry
            .get::<ManagedProcess>(&name)
            .map(|p| p.pid().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "║ {} {:<24} pid {:<8} [{}]",
            status_icon,
            name.as_str(),
            pid,
            state
        );
    }

    println!("╚══════════════════════════════════════════════════════════════╝");
}
