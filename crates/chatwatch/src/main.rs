// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! chatwatch - live token chat watcher with periodic AI commentary.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chatwatch - live token chat watcher with periodic AI commentary.
#[derive(Parser, Debug)]
#[command(name = "chatwatch", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard search path.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Connect to the chat room and serve the HTTP API (default).
    Serve,
    /// Validate configuration and test the completion endpoint.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => chatwatch_config::load_and_validate_path(path),
        None => chatwatch_config::load_and_validate(),
    };
    let config = match loaded.and_then(|config| {
        chatwatch_config::validate_startup(&config)?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(errors) => {
            chatwatch_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Check => check::run_check(&config).await,
    };

    if let Err(e) = result {
        eprintln!("chatwatch: {e}");
        std::process::exit(1);
    }
}

/// Filter for every `chatwatch_*` target at `log_level`, everything else at warn.
fn default_directive(log_level: &str) -> String {
    format!("chatwatch={log_level},warn")
}

/// Installed before any subcommand runs.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["chatwatch"]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.command.unwrap_or(Commands::Serve), Commands::Serve);
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["chatwatch", "check", "--config", "/tmp/cw.toml"]);
        assert_eq!(cli.command, Some(Commands::Check));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cw.toml")));
    }

    #[test]
    fn default_directive_parses_for_configured_levels() {
        use tracing_subscriber::EnvFilter;

        for level in ["trace", "debug", "info", "warn", "error"] {
            let directive = default_directive(level);
            assert!(EnvFilter::try_new(&directive).is_ok(), "{directive}");
        }
        assert_eq!(default_directive("debug"), "chatwatch=debug,warn");
    }

    #[test]
    fn inline_config_validates() {
        let config = chatwatch_config::load_and_validate_str(
            "[chat]\nroom_id = \"TokenAddr\"\n[openai]\napi_key = \"sk-test\"\n",
        )
        .expect("inline config should be valid");
        assert!(chatwatch_config::validate_startup(&config).is_ok());
    }
}
