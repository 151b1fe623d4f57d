use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::OracleArg;

#[derive(Parser)]
#[command(name = "rdk")]
#[command(about = "RateDesk CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overlays...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run a desk and drive it with line commands from a script or stdin
    Session {
        /// Desk config overlays in merge order (layered over the built-in desk)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Override the configured oracle
        #[arg(long, value_enum)]
        oracle: Option<OracleArg>,

        /// Read commands from this file instead of stdin
        #[arg(long)]
        script: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rdk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Session {
            config_paths,
            oracle,
            script,
        } => {
            let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
            let loaded = rdk_config::load_desk_config(&path_refs)?;
            let desk = commands::start_desk(&loaded.desk, oracle)?;

            let mut stdout = std::io::stdout().lock();
            match script {
                Some(path) => {
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("open script: {}", path.display()))?;
                    let reader = tokio::io::BufReader::new(file);
                    commands::session::run_session(&desk, reader, &mut stdout).await?;
                }
                None => {
                    let reader = tokio::io::BufReader::new(tokio::io::stdin());
                    commands::session::run_session(&desk, reader, &mut stdout).await?;
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
