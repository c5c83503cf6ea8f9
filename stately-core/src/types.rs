// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Maximum length of a state name.
const MAX_STATE_NAME_LEN: usize = 128;

/// Type-erased instance value produced by a lifecycle callback.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Validated state name.
/// Must be non-empty, max 128 chars, alphanumeric or one of `-_./:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateName(String);

impl StateName {
    /// Create a new StateName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "state_name",
                value: name,
                reason: "State name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_STATE_NAME_LEN {
            return Err(HardValidationError::InvalidFieldValue {
                field: "state_name",
                value: name.clone(),
                reason: format!(
                    "State name too long: {} chars (max {})",
                    name.len(),
                    MAX_STATE_NAME_LEN
                ),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "state_name",
                value: name,
                reason: "State name must contain only alphanumeric characters and -_./:"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StateName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StateName {
    type Error = HardValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StateName> for String {
    fn from(name: StateName) -> Self {
        name.0
    }
}

impl AsRef<str> for StateName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
