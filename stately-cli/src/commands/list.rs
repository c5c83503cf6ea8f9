// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `stately list` command - List states from a manifest.
//!
//! States are listed in declaration order, which is also start order.

use stately_core::ManifestLoader;

pub async fn execute(manifest_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = ManifestLoader::load_file(manifest_path)?;

    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                              DECLARED STATES                                 ║");
    println!("╠═══════╦═══════════════════╦═════════════╦════════════════════════════════════╣");
    println!("║ Order ║ Name              ║ Suspendable ║ Command                            ║");
    println!("╠═══════╬═══════════════════╬═════════════╬════════════════════════════════════╣");

    for (index, state) in manifest.states.iter().enumerate() {
        let mut command = state.process.display_command();
        if command.chars().count() > 34 {
            command = command.chars().take(31).collect::<String>() + "...";
        }

        println!(
            "║ {:<5} ║ {:<17} ║ {:<11} ║ {:<34} ║",
            index + 1,
            state.name.as_str(),
            if state.process.suspendable { "yes" } else { "no" },
            command
        );
    }

    println!("╚═══════╩═══════════════════╩═════════════╩════════════════════════════════════╝");
    println!();
    println!("Total: {} state(s)", manifest.states.len());

    Ok(())
}
