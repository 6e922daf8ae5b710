// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signoff - fortnightly timecard sign-off with a KMS-backed credential vault.
//!
//! This is the binary entry point for the worker, scheduler, and admin CLI.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use signoff_config::model::SignoffConfig;

/// Signoff - fortnightly timecard sign-off service.
#[derive(Parser, Debug)]
#[command(name = "signoff", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG search path.
    #[arg(long, global = true, env = "SIGNOFF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the queue workers and the fortnightly scheduler.
    Serve,
    /// Queue sign-off tasks for every eligible user.
    Enqueue {
        /// Enqueue even when today is not a sign-off Sunday.
        #[arg(long)]
        force: bool,
    },
    /// Run one user's sign-off now, bypassing the queue.
    Run {
        /// Email of the user to sign off for.
        email: String,
    },
    /// Store or replace a user's portal credentials.
    SetCredentials {
        /// User email; the user is created if missing.
        email: String,
        /// Portal username.
        #[arg(long)]
        username: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Show per-user counters, interrupted runs, and queue depth.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the merged configuration with secrets masked.
    Show,
    /// Validate the configuration and exit.
    Validate,
}

fn load_config(path: Option<&PathBuf>) -> SignoffConfig {
    let loaded = match path {
        Some(path) => signoff_config::load_and_validate_path(path),
        None => signoff_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            signoff_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("signoff={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Enqueue { force }) => commands::run_enqueue(&config, force).await,
        Some(Commands::Run { email }) => commands::run_once(&config, &email).await,
        Some(Commands::SetCredentials {
            email,
            username,
            first_name,
            last_name,
        }) => {
            commands::run_set_credentials(
                &config,
                &email,
                &username,
                first_name.as_deref(),
                last_name.as_deref(),
            )
            .await
        }
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Config { action }) => match action {
            ConfigCommands::Show => commands::show_config(&config),
            ConfigCommands::Validate => {
                println!("signoff: configuration is valid");
                Ok(())
            }
        },
        None => {
            println!("signoff: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

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
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_enqueue_force() {
        let cli = Cli::try_parse_from(["signoff", "enqueue", "--force"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Enqueue { force: true })));
    }

    #[test]
    fn parses_set_credentials() {
        let cli = Cli::try_parse_from([
            "signoff",
            "set-credentials",
            "Jane@Example.com",
            "--username",
            "jdoe",
            "--first-name",
            "Jane",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::SetCredentials {
                email,
                username,
                first_name,
                last_name,
            }) => {
                assert_eq!(email, "Jane@Example.com");
                assert_eq!(username, "jdoe");
                assert_eq!(first_name.as_deref(), Some("Jane"));
                assert!(last_name.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn set_credentials_requires_username() {
        assert!(Cli::try_parse_from(["signoff", "set-credentials", "a@b.com"]).is_err());
    }

    #[test]
    fn global_config_flag_is_accepted_after_subcommand() {
        let cli =
            Cli::try_parse_from(["signoff", "status", "--json", "--config", "/tmp/s.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Status {
                json: true,
                plain: false
            })
        ));
    }
}
