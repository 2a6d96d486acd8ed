use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use robot_task_core::{Config, TaskCompiler};

#[derive(Parser)]
#[command(name = "robot-task", about = "Validate and lower robot task plans", version)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "robot-task.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a reasoning-service payload, lower it and print the result
    Compile {
        /// Payload file, or `-` for stdin
        #[arg(default_value = "-")]
        payload: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Output::Script)]
        output: Output,

        /// Also reject coordinates outside the configured workspace
        #[arg(long)]
        check_bounds: bool,
    },
    /// List registered actions and aliases
    Actions,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Script,
    Invocations,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("robot_task_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let registry = config
        .registry()
        .context("Failed to build action registry")?;
    let compiler = TaskCompiler::from_registry(Arc::new(registry));

    match cli.command {
        Commands::Compile {
            payload,
            output,
            check_bounds,
        } => {
            let raw = read_payload(&payload)?;
            let task = compiler.compile(&raw).map_err(|e| {
                tracing::error!(code = e.code(), "plan rejected");
                anyhow::Error::new(e)
            })?;

            if check_bounds {
                config.workspace.check(&task.invocations)?;
            }

            match output {
                Output::Script => print!("{}", task.script),
                Output::Invocations => {
                    println!("{}", serde_json::to_string_pretty(&task.invocations)?)
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&task)?),
            }
        }
        Commands::Actions => {
            for (name, descriptor) in compiler.registry().actions() {
                println!("{name:<16} {descriptor}");
            }
            for (alias, action) in compiler.registry().aliases() {
                println!("{alias:<16} -> {action}");
            }
        }
    }

    Ok(())
}

fn read_payload(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read payload from stdin")?;
        return Ok(raw);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))
}
