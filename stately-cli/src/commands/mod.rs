// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod graph;
pub mod list;
pub mod up;
pub mod validate;

use stately_core::{HardValidationError, StateName};

/// Validate state names given on the command line.
pub(crate) fn parse_names(raw: &[String]) -> Result<Vec<StateName>, HardValidationError> {
    raw.iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| StateName::new(s.trim()))
        .collect()
}
