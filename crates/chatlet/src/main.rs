// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatlet - user-authored chat commands, hosted.
//!
//! This is the binary entry point for the Chatlet extension host.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod inspect;
mod serve;
mod shutdown;

use std::path::PathBuf;

use chatlet_config::model::ChatletConfig;
use clap::{Parser, Subcommand};

/// Chatlet - user-authored chat commands, hosted.
#[derive(Parser, Debug)]
#[command(name = "chatlet", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the extension host.
    Serve,
    /// List stored scripts, for one chat or all of them.
    Scripts {
        /// Chat id to list.
        #[arg(allow_negative_numbers = true)]
        chat_id: Option<i64>,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Show recent execution log entries for a chat.
    Logs {
        /// Chat id to inspect. Group ids are negative.
        #[arg(allow_negative_numbers = true)]
        chat_id: i64,
        /// Number of entries, newest first.
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Validate the configuration and print a summary.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> ChatletConfig {
    let loaded = match path {
        Some(path) => chatlet_config::load_and_validate_path(path),
        None => chatlet_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            chatlet_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Scripts {
            chat_id,
            json,
            plain,
        }) => inspect::run_scripts(&config, chat_id, json, plain).await,
        Some(Commands::Logs {
            chat_id,
            limit,
            json,
            plain,
        }) => inspect::run_logs(&config, chat_id, limit, json, plain).await,
        Some(Commands::CheckConfig) => {
            print!("{}", inspect::config_summary(&config));
            Ok(())
        }
        None => {
            println!("chatlet: use --help for available commands");
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

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn parses_logs_with_limit() {
        let cli = Cli::try_parse_from(["chatlet", "logs", "-100", "--limit", "5"]).unwrap();
        match cli.command {
            Some(Commands::Logs { chat_id, limit, .. }) => {
                assert_eq!(chat_id, -100);
                assert_eq!(limit, 5);
            }
            other => panic!("expected logs, got {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["chatlet", "check-config", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }

    #[test]
    fn scripts_chat_is_optional() {
        let cli = Cli::try_parse_from(["chatlet", "scripts", "--plain"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Scripts {
                chat_id: None,
                plain: true,
                ..
            })
        ));
    }

    #[test]
    fn logs_requires_chat_id() {
        assert!(Cli::try_parse_from(["chatlet", "logs"]).is_err());
    }
}
