mod server;


use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use namepool_core::{BackendRegistry, Name, NameManager};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "namepool",
    about = "Manage shared test resources with a global lock",
    version
)]
struct Cli {
    /// Backend connection string, e.g. "local://~/.namepool" or
    /// "rest://localhost:9008".
    #[arg(
        long,
        global = true,
        default_value = "local://~/.namepool",
        env = "NAMEPOOL_BACKEND"
    )]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Holds a name for a family, releasing it on Ctrl-C; with a trailing
    /// command, runs it and releases on exit
    Hold {
        family: String,
        /// Command to run while the name is held; it sees the name in
        /// $NAMEPOOL_NAME and its exit code is propagated
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Acquires a name for a family
    Acquire { family: String },

    /// Keeps a name alive
    #[command(name = "keep_alive")]
    KeepAlive { family: String, name: String },

    /// Releases a name
    Release { family: String, name: String },

    /// Lists all names
    List,

    /// Resets the backend
    Reset,

    /// Serves the backend over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:9008")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let manager = BackendRegistry::with_defaults().create(&cli.backend)?;

    match cli.command {
        Commands::Hold { family, command } => run_hold(manager, family, command).await,
        Commands::Acquire { family } => {
            let name = blocking(move || manager.acquire(&family)).await?;
            print!("{name}");
            Ok(())
        }
        Commands::KeepAlive { family, name } => {
            check_family_name(&family, &name)?;
            blocking(move || manager.keep_alive(&family, &name)).await
        }
        Commands::Release { family, name } => {
            check_family_name(&family, &name)?;
            blocking(move || manager.release(&family, &name)).await
        }
        Commands::List => {
            let names = blocking(move || manager.list()).await?;
            print_names(&names);
            Ok(())
        }
        Commands::Reset => blocking(move || manager.reset()).await,
        Commands::Serve { address } => server::run(&address, manager).await,
    }
}

async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> namepool_core::Result<T> + Send + 'static,
) -> anyhow::Result<T> {
    let result = tokio::task::spawn_blocking(f)
        .await
        .context("backend task failed")?;
    Ok(result?)
}

fn check_family_name(family: &str, name: &str) -> anyhow::Result<()> {
    if family.is_empty() || name.is_empty() {
        anyhow::bail!("expected arguments to be <family> <name>");
    }
    Ok(())
}

async fn run_hold(
    manager: Arc<dyn NameManager>,
    family: String,
    command: Vec<String>,
) -> anyhow::Result<()> {
    let held = {
        let manager = Arc::clone(&manager);
        tokio::task::spawn_blocking(move || namepool_core::hold(manager, &family))
            .await
            .context("backend task failed")??
    };

    if command.is_empty() {
        // No command given: release on Ctrl-C.
        println!("{}", held.name());
        let errors = held.errors();
        let background = tokio::task::spawn_blocking(move || errors.recv());
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            joined = background => {
                if let Ok(Ok(err)) = joined {
                    return Err(err.into());
                }
            }
        }
        blocking(move || held.release()).await
    } else {
        let status = tokio::process::Command::new(&command[0])
            .args(&command[1..])
            .env("NAMEPOOL_NAME", held.name())
            .status()
            .await;
        blocking(move || held.release()).await?;
        let status = status.context("cannot run the held command")?;
        if !status.success() {
            std::process::exit(status.code().unwrap_or(1));
        }
        Ok(())
    }
}

fn print_names(names: &[Name]) {
    let now = Utc::now();
    let mut rows = vec![[
        "NAME".to_string(),
        "FAMILY".to_string(),
        "CREATED AT".to_string(),
        "UPDATED AT".to_string(),
        "FREE".to_string(),
    ]];
    for name in names {
        let updated_at = if name.free || name.updated_at == name.created_at {
            String::new()
        } else {
            ago(now, name.updated_at)
        };
        rows.push([
            name.name.clone(),
            name.family.clone(),
            ago(now, name.created_at),
            updated_at,
            if name.free { "X" } else { "" }.to_string(),
        ]);
    }

    let mut widths = [0usize; 5];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    for row in &rows {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

/// Relative age, rounded to its most significant unit ("3h ago").
fn ago(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(at).num_seconds();
    if seconds <= 0 {
        return "now".to_string();
    }
    let seconds = seconds as u64;
    let rounded = if seconds < 60 {
        seconds
    } else if seconds < 3600 {
        seconds / 60 * 60
    } else if seconds < 86400 {
        seconds / 3600 * 3600
    } else {
        seconds / 86400 * 86400
    };
    format!("{} ago", humantime::format_duration(Duration::from_secs(rounded)))
}
