// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for stately.
//!
//! These tests drive whole registries through the public orchestration API,
//! from declaration to stop, including process-backed states.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use stately_core::{
    Lifecycle, ManagedProcess, ManifestLoader, Orchestrator, Outcome, Replacement, RunState,
    StateName, StateRegistry, StatelyError, TransitionError,
};
use tempfile::TempDir;

fn name(s: &str) -> StateName {
    StateName::new(s).expect("valid state name")
}

type Events = Arc<Mutex<Vec<String>>>;

/// Lifecycle that records every call as "<verb>:<state>".
fn recorded(events: &Events) -> Lifecycle {
    let on_start = Arc::clone(events);
    let on_stop = Arc::clone(events);
    let on_suspend = Arc::clone(events);
    let on_resume = Arc::clone(events);
    Lifecycle::new()
        .start(move |ctx| {
            on_start.lock().unwrap().push(format!("start:{}", ctx.name()));
            Ok(format!("{}-instance", ctx.name()))
        })
        .stop(move |ctx| {
            on_stop.lock().unwrap().push(format!("stop:{}", ctx.name()));
            Ok(())
        })
        .suspend(move |ctx| {
            on_suspend.lock().unwrap().push(format!("suspend:{}", ctx.name()));
            let live = ctx.current::<String>().ok_or("nothing to suspend")?;
            Ok(Paused(live.to_string()))
        })
        .resume(move |ctx| {
            on_resume.lock().unwrap().push(format!("resume:{}", ctx.name()));
            let paused = ctx.current::<Paused>().ok_or("nothing to resume")?;
            Ok(paused.0.clone())
        })
}

#[derive(Debug)]
struct Paused(String);

fn pqr(events: &Events) -> Orchestrator {
    let registry = StateRegistry::new_shared();
    for s in ["p", "q", "r"] {
        registry.register(name(s), recorded(events)).unwrap();
    }
    Orchestrator::new(registry)
}

fn drain(events: &Events) -> Vec<String> {
    std::mem::take(&mut *events.lock().unwrap())
}

#[test]
fn test_order_stability_across_redeclaration() {
    let registry = StateRegistry::new();
    let a = registry.register(name("a"), Lifecycle::new().start(|_| Ok(1u8))).unwrap();
    let b = registry.register(name("b"), Lifecycle::new().start(|_| Ok(2u8))).unwrap();
    assert!(a < b);

    let a_again = registry.register(name("a"), Lifecycle::new().start(|_| Ok(3u8))).unwrap();
    assert_eq!(a_again, a);
    assert_eq!(registry.order(&name("a")).unwrap(), a);
}

#[test]
fn test_batch_ordering_scenario() {
    let events = Events::default();
    let orch = pqr(&events);

    orch.start().unwrap();
    assert_eq!(drain(&events), vec!["start:p", "start:q", "start:r"]);

    orch.stop().unwrap();
    assert_eq!(drain(&events), vec!["stop:r", "stop:q", "stop:p"]);
}

#[test]
fn test_idempotent_start_and_stop() {
    let events = Events::default();
    let orch = pqr(&events);

    orch.start().unwrap();
    let bound = orch.registry().get::<String>(&name("q")).unwrap();
    drain(&events);

    assert_eq!(orch.start().unwrap(), Outcome::Started(vec![]));
    assert!(drain(&events).is_empty());
    assert!(Arc::ptr_eq(
        &bound,
        &orch.registry().get::<String>(&name("q")).unwrap()
    ));

    orch.stop().unwrap();
    drain(&events);
    assert_eq!(orch.stop().unwrap(), Outcome::Stopped(vec![]));
    assert!(drain(&events).is_empty());
}

#[test]
fn test_partial_failure_scenario() {
    let events = Events::default();
    let registry = StateRegistry::new_shared();
    registry.register(name("p"), recorded(&events)).unwrap();
    registry
        .register(
            name("q"),
            Lifecycle::new().start(|_| -> Result<(), _> { Err("port in use".into()) }),
        )
        .unwrap();
    registry.register(name("r"), recorded(&events)).unwrap();
    let orch = Orchestrator::new(Arc::clone(&registry));

    let err = orch.start().unwrap_err();
    match &err {
        StatelyError::Transition(TransitionError::StartFailure { name: failed, source }) => {
            assert_eq!(failed, &name("q"));
            assert_eq!(source.to_string(), "port in use");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(registry.run_state(&name("p")).unwrap(), RunState::Started);
    assert_eq!(registry.run_state(&name("q")).unwrap(), RunState::NotStarted);
    assert_eq!(registry.run_state(&name("r")).unwrap(), RunState::NotStarted);
    assert_eq!(drain(&events), vec!["start:p"]);
}

#[test]
fn test_stop_except_scenario() {
    let events = Events::default();
    let orch = pqr(&events);
    orch.start().unwrap();
    drain(&events);

    let outcome = orch.stop_except(&[name("q")]).unwrap();
    assert_eq!(outcome, Outcome::Stopped(vec![name("r"), name("p")]));
    assert_eq!(drain(&events), vec!["stop:r", "stop:p"]);

    let registry = orch.registry();
    assert_eq!(registry.run_state(&name("q")).unwrap(), RunState::Started);
    assert_eq!(registry.running_states(), vec![name("q")]);
}

#[test]
fn test_suspend_resume_round_trip() {
    let events = Events::default();
    let orch = pqr(&events);
    orch.start().unwrap();
    drain(&events);

    orch.suspend().unwrap();
    assert_eq!(drain(&events), vec!["suspend:p", "suspend:q", "suspend:r"]);
    let registry = orch.registry();
    assert_eq!(registry.run_state(&name("p")).unwrap(), RunState::Suspended);
    assert!(registry.get::<Paused>(&name("p")).is_some());

    orch.resume().unwrap();
    assert_eq!(drain(&events), vec!["resume:p", "resume:q", "resume:r"]);
    assert_eq!(
        registry.get::<String>(&name("p")).as_deref().map(String::as_str),
        Some("p-instance")
    );

    // A suspended state is stopped like a started one.
    orch.suspend_states(&[name("q")]).unwrap();
    orch.stop().unwrap();
    assert!(drain(&events).contains(&"stop:q".to_string()));
    assert!(registry.running_states().is_empty());
}

#[test]
fn test_no_suspend_without_resume() {
    let registry = StateRegistry::new();
    let err = registry
        .register(
            name("cache"),
            Lifecycle::new().start(|_| Ok(0u8)).suspend(|_| Ok(1u8)),
        )
        .unwrap_err();
    assert!(matches!(err, StatelyError::InvalidLifecycle(_)));
    assert!(!registry.contains(&name("cache")));
}

#[test]
fn test_resume_after_stop_rejected() {
    let events = Events::default();
    let orch = pqr(&events);
    orch.start().unwrap();
    orch.suspend().unwrap();
    orch.stop().unwrap();

    let err = orch.resume_states(&[name("p")]).unwrap_err();
    assert!(matches!(
        err,
        StatelyError::Transition(TransitionError::ResumeOnStopped { .. })
    ));
}

#[test]
fn test_substitution_rollback() {
    let events = Events::default();
    let registry = StateRegistry::new_shared();
    registry.register(name("db"), recorded(&events)).unwrap();
    registry
        .register(name("fake-db"), Lifecycle::new().start(|_| Ok(Fake)))
        .unwrap();
    registry.register(name("api"), recorded(&events)).unwrap();
    let declared = registry.lifecycle(&name("db")).unwrap();
    let orch = Orchestrator::new(Arc::clone(&registry));

    let outcome = orch
        .start_with([(name("db"), Replacement::State(name("fake-db")))])
        .unwrap();
    assert_eq!(outcome.states(), &[name("db"), name("api")]);
    assert!(registry.get::<Fake>(&name("db")).is_some());
    assert_eq!(registry.run_state(&name("fake-db")).unwrap(), RunState::NotStarted);
    assert_eq!(drain(&events), vec!["start:api"]);

    orch.stop().unwrap();
    assert!(registry.lifecycle(&name("db")).unwrap().ptr_eq(&declared));
    assert!(registry.binding(&name("db")).unwrap().is_not_started());
    assert!(!registry.is_substitute(&name("fake-db")).unwrap());

    orch.start().unwrap();
    assert!(registry.get::<Fake>(&name("db")).is_none());
    assert!(registry.get::<String>(&name("db")).is_some());
}

#[derive(Debug)]
struct Fake;

#[test]
fn test_start_with_anonymous_double() {
    let events = Events::default();
    let orch = pqr(&events);

    orch.start_with([(
        name("q"),
        Replacement::Lifecycle(Lifecycle::new().start(|_| Ok("double".to_string()))),
    )])
    .unwrap();
    assert_eq!(drain(&events), vec!["start:p", "start:r"]);
    assert_eq!(
        orch.registry().get::<String>(&name("q")).as_deref().map(String::as_str),
        Some("double")
    );

    orch.stop().unwrap();
    // The double had no stop function; the declared one is back afterwards.
    assert_eq!(drain(&events), vec!["stop:r", "stop:p"]);
    orch.start().unwrap();
    assert_eq!(drain(&events), vec!["start:p", "start:q", "start:r"]);
}

#[test]
fn test_out_of_order_dependency_is_reported_not_fixed() {
    let registry = StateRegistry::new_shared();
    let db = name("db");
    registry
        .register(
            name("server"),
            Lifecycle::new().start(move |ctx| Ok(ctx.get::<u16>(&db).is_some())),
        )
        .unwrap();
    registry
        .register(name("db"), Lifecycle::new().start(|_| Ok(5432u16)))
        .unwrap();
    let orch = Orchestrator::new(Arc::clone(&registry));

    orch.start().unwrap();

    // Declaration order wins: server started before db and saw nothing.
    assert_eq!(registry.get::<bool>(&name("server")).as_deref(), Some(&false));
    let conflicts = registry.ordering_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].depender, name("server"));
    assert_eq!(conflicts[0].dependee, name("db"));
}

#[test]
fn test_args_visible_to_lifecycles() {
    let registry = StateRegistry::new_shared();
    registry
        .register(
            name("cli"),
            Lifecycle::new().start(|ctx| Ok(ctx.args().unwrap_or_default().len())),
        )
        .unwrap();
    let orch = Orchestrator::new(Arc::clone(&registry));

    orch.start_with_args(vec!["-v".into(), "run".into()]).unwrap();
    assert_eq!(registry.get::<usize>(&name("cli")).as_deref(), Some(&2));
    assert_eq!(orch.args(), Some(vec!["-v".to_string(), "run".to_string()]));
}

#[test]
fn test_process_states_from_manifest_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manifest_path = temp_dir.path().join("stately.yaml");
    std::fs::write(
        &manifest_path,
        r#"
engine:
  stop_timeout_ms: 2000
states:
  - name: worker
    command: ["sleep", "30"]
    suspendable: true
  - name: sidecar
    command: ["sleep", "30"]
    uses: [worker]
"#,
    )
    .expect("Failed to write manifest");

    let manifest = ManifestLoader::load_file(&manifest_path).unwrap();
    let registry = StateRegistry::new_shared();
    manifest.register_all(&registry).unwrap();
    let orch = Orchestrator::new(Arc::clone(&registry));

    orch.start().unwrap();
    let worker = registry.get::<ManagedProcess>(&name("worker")).unwrap();
    let sidecar = registry.get::<ManagedProcess>(&name("sidecar")).unwrap();
    assert!(worker.is_running());
    assert!(sidecar.is_running());

    // Only the suspendable process is paused.
    let outcome = orch.suspend().unwrap();
    assert_eq!(outcome, Outcome::Suspended(vec![name("worker")]));
    assert_eq!(registry.run_state(&name("worker")).unwrap(), RunState::Suspended);
    assert!(Arc::ptr_eq(
        &worker,
        &registry.get::<ManagedProcess>(&name("worker")).unwrap()
    ));

    orch.resume().unwrap();
    assert_eq!(registry.run_state(&name("worker")).unwrap(), RunState::Started);

    // Stop a paused process too: it must still exit.
    orch.suspend().unwrap();
    orch.stop().unwrap();
    assert!(!worker.is_running());
    assert!(!sidecar.is_running());

    let report = registry.states_with_dependencies();
    assert!(report[1].depends_on.contains(&name("worker")));
}

#[test]
fn test_process_stop_escalates_to_kill() {
    let yaml = r#"
states:
  - name: stubborn
    command: ["sh", "-c", "trap '' TERM; while :; do sleep 1; done"]
    stop_timeout_ms: 200
"#;
    let manifest = ManifestLoader::load_string(yaml).unwrap();
    let registry = StateRegistry::new_shared();
    manifest.register_all(&registry).unwrap();
    let orch = Orchestrator::new(Arc::clone(&registry));

    orch.start().unwrap();
    let process = registry.get::<ManagedProcess>(&name("stubborn")).unwrap();
    // Give the shell time to install its trap.
    std::thread::sleep(Duration::from_millis(100));

    orch.stop().unwrap();
    assert!(!process.is_running());
}
