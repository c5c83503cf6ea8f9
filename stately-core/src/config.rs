// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML manifest parser with strict schema validation.
//!
//! A manifest declares process-backed states in declaration order. Any
//! invalid field results in a HardValidationError before anything is
//! registered.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use serde::Deserialize;

use crate::error::{HardValidationError, StatelyError, StatelyResult};
use crate::process::{parse_signal, ProcessSpec};
use crate::registry::StateRegistry;
use crate::types::StateName;

/// Upper bound on a stop grace period: 10 minutes.
const MAX_STOP_TIMEOUT_MS: u64 = 600_000;

/// Raw state declaration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStateConfig {
    name: String,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    suspendable: bool,
    #[serde(default)]
    uses: Vec<String>,
    #[serde(default)]
    stop_signal: Option<String>,
    #[serde(default)]
    stop_timeout_ms: Option<u64>,
}

/// Raw engine defaults.
#[derive(Debug, Deserialize)]
struct RawEngineConfig {
    #[serde(default = "default_stop_timeout_ms")]
    stop_timeout_ms: u64,
    #[serde(default = "default_stop_signal")]
    stop_signal: String,
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

fn default_stop_signal() -> String {
    "SIGTERM".to_string()
}

impl Default for RawEngineConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
            stop_signal: default_stop_signal(),
        }
    }
}

/// Raw root manifest.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    engine: RawEngineConfig,
    #[serde(default)]
    states: Vec<RawStateConfig>,
}

/// Validated engine defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stop_timeout: Duration,
    pub stop_signal: Signal,
}

/// Validated state declaration.
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub name: StateName,
    pub process: ProcessSpec,
}

/// Complete validated manifest, states in declaration order.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub engine: EngineConfig,
    pub states: Vec<StateConfig>,
}

impl Manifest {
    /// Declare every state in manifest order, returning their names.
    pub fn register_all(&self, registry: &StateRegistry) -> StatelyResult<Vec<StateName>> {
        let mut names = Vec::with_capacity(self.states.len());
        for state in &self.states {
            registry.register(state.name.clone(), state.process.clone().into_lifecycle())?;
            names.push(state.name.clone());
        }
        Ok(names)
    }

    pub fn state_names(&self) -> Vec<StateName> {
        self.states.iter().map(|s| s.name.clone()).collect()
    }
}

/// Manifest loader with strict validation.
pub struct ManifestLoader;

impl ManifestLoader {
    /// Load and validate a manifest from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> StatelyResult<Manifest> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(StatelyError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| StatelyError::Io {
            context: "reading manifest file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate a manifest from a YAML string.
    pub fn load_string(content: &str) -> StatelyResult<Manifest> {
        let raw: RawManifest =
            serde_yaml::from_str(content).map_err(|e| StatelyError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawManifest) -> StatelyResult<Manifest> {
        let engine = Self::validate_engine(raw.engine)?;

        if raw.states.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one state must be declared".to_string(),
            }
            .into());
        }

        let mut states = Vec::with_capacity(raw.states.len());
        let mut seen = HashSet::new();
        for (index, raw_state) in raw.states.into_iter().enumerate() {
            let state = Self::validate_state(raw_state, index, &engine)?;
            if !seen.insert(state.name.clone()) {
                return Err(HardValidationError::DuplicateStateName {
                    name: state.name.to_string(),
                }
                .into());
            }
            states.push(state);
        }

        // `uses` may point forward; the dependency report flags those.
        for state in &states {
            for dependee in &state.process.uses {
                if !seen.contains(dependee) {
                    return Err(HardValidationError::UnknownDependency {
                        state: state.name.to_string(),
                        dependee: dependee.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(Manifest { engine, states })
    }

    fn validate_engine(raw: RawEngineConfig) -> StatelyResult<EngineConfig> {
        Ok(EngineConfig {
            stop_timeout: validate_timeout("engine.stop_timeout_ms", raw.stop_timeout_ms)?,
            stop_signal: validate_signal("engine.stop_signal", &raw.stop_signal)?,
        })
    }

    fn validate_state(
        raw: RawStateConfig,
        index: usize,
        engine: &EngineConfig,
    ) -> StatelyResult<StateConfig> {
        let name = StateName::new(&raw.name).map_err(|mut e| {
            if let HardValidationError::InvalidFieldValue { ref mut field, .. } = e {
                *field = "name";
            }
            e
        })?;

        if raw.command.is_empty() || raw.command[0].trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "command",
                context: format!("state '{}' at index {}", name, index),
            }
            .into());
        }

        let mut uses = Vec::with_capacity(raw.uses.len());
        for dependee in raw.uses {
            let dependee = StateName::new(dependee)?;
            if dependee == name {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "uses",
                    value: dependee.to_string(),
                    reason: "A state cannot use itself".to_string(),
                }
                .into());
            }
            uses.push(dependee);
        }

        let stop_signal = match raw.stop_signal {
            Some(sig) => validate_signal("stop_signal", &sig)?,
            None => engine.stop_signal,
        };
        let stop_timeout = match raw.stop_timeout_ms {
            Some(ms) => validate_timeout("stop_timeout_ms", ms)?,
            None => engine.stop_timeout,
        };

        Ok(StateConfig {
            name,
            process: ProcessSpec {
                command: raw.command,
                env: raw.env,
                working_dir: raw.working_dir.map(PathBuf::from),
                suspendable: raw.suspendable,
                stop_signal,
                stop_timeout,
                uses,
            },
        })
    }
}

fn validate_timeout(field: &'static str, ms: u64) -> Result<Duration, HardValidationError> {
    if ms == 0 || ms > MAX_STOP_TIMEOUT_MS {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: ms.to_string(),
            reason: format!("Must be between 1 and {} ms", MAX_STOP_TIMEOUT_MS),
        });
    }
    Ok(Duration::from_millis(ms))
}

fn validate_signal(field: &'static str, name: &str) -> Result<Signal, HardValidationError> {
    parse_signal(name).ok_or_else(|| HardValidationError::InvalidFieldValue {
        field,
        value: name.to_string(),
        reason: "Unknown signal".to_string(),
    })
}
