// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stately validate` command - Validate a manifest file.

use stately_core::ManifestLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating manifest");

    match ManifestLoader::load_file(file) {
        Ok(manifest) => {
            println!("✓ Manifest is valid");
            println!();
            println!("Engine Settings:");
            println!(
                "  Stop Timeout:       {}ms",
                manifest.engine.stop_timeout.as_millis()
            );
            println!(
                "  Stop Signal:        {}",
                manifest.engine.stop_signal.as_str()
            );
            println!();
            println!("States ({}):", manifest.states.len());
            for (index, state) in manifest.states.iter().enumerate() {
                println!(
                    "  {}. {} ({}{})",
                    index + 1,
                    state.name,
                    state.process.display_command(),
                    if state.process.suspendable {
                        ", suspendable"
                    } else {
                        ""
                    }
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Manifest validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
