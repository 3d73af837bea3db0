// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sweepguard - chat-protection auto-delete service for Telegram groups.
//!
//! This is the binary entry point for the Sweepguard service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use clap::{Parser, Subcommand};

/// Sweepguard - auto-deletes bot content and stickers in protected groups.
#[derive(Parser, Debug)]
#[command(name = "sweepguard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Sweepguard service.
    Serve,
    /// Load and validate the configuration, then exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match sweepguard_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            sweepguard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(error) = serve::run_serve(config).await {
                eprintln!("sweepguard: {error}");
                std::process::exit(1);
            }
        }
        Some(Commands::Check) => {
            println!(
                "sweepguard: config ok (service.name={}, storage.database_path={})",
                config.service.name, config.storage.database_path
            );
        }
        None => {
            println!("sweepguard: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this -- the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = sweepguard_config::load_and_validate()
            .expect("default config should be valid");
        assert_eq!(config.service.name, "sweepguard");
        assert_eq!(config.engine.delete_delay_seconds, 35);
    }
}
