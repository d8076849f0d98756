//! MediSecure CLI - log in and call the MediSecure API from the terminal.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};

/// MediSecure command-line interface.
#[derive(Parser, Debug)]
#[command(name = "medisecure")]
#[command(about = "Command-line client for the MediSecure medical office API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, session and logs. Defaults to ~/.medisecure
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Username (usually the email address)
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(short, long, env = "MEDISECURE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Log out and clear the stored session
    Logout,
    /// Show the stored session
    Status,
    /// Request a password reset email
    ResetPassword {
        /// Account email address
        email: String,
    },
    /// GET a path relative to the API URL
    Get { path: String },
    /// DELETE a path relative to the API URL
    Delete { path: String },
    /// POST a JSON body
    Post {
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// PUT a JSON body
    Put {
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// PATCH a JSON body
    Patch {
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, &config.log_format, Some(paths.log_file()))?;

    commands::run(cli.command, &config, &paths).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from([
            "medisecure",
            "login",
            "-u",
            "dr.martin",
            "-p",
            "s3cret",
            "--base-dir",
            "/tmp/ms",
        ])
        .unwrap();

        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/ms")));
        match cli.command {
            Commands::Login { username, password } => {
                assert_eq!(username, "dr.martin");
                assert_eq!(password.as_deref(), Some("s3cret"));
            }
            other => panic!("Expected login, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_post_with_data() {
        let cli = Cli::try_parse_from([
            "medisecure",
            "post",
            "/patients",
            "--data",
            r#"{"first_name":"Jean"}"#,
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Post { path, data } => {
                assert_eq!(path, "/patients");
                assert_eq!(data.as_deref(), Some(r#"{"first_name":"Jean"}"#));
            }
            other => panic!("Expected post, got {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["medisecure"]).is_err());
    }
}
