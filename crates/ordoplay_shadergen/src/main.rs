// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` shader graph generator
//!
//! Compiles shader graph documents into shading source files:
//! - `init` writes a default configuration
//! - `build` compiles every configured graph once
//! - `watch` keeps recompiling as libraries or pipelines change
//!
//! ## Architecture
//!
//! The tool is a thin driver around `ordoplay_shader_graph`. It reads a RON
//! configuration, loads the listed pipelines and graphs into a workspace and
//! writes generated sources through a [`source_cache::SourceCache`].

mod config;
mod session;
mod source_cache;

use clap::{Parser, Subcommand};
use config::{ShadergenConfig, DEFAULT_CONFIG_FILE};
use session::Session;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ordoplay_shadergen")]
#[command(about = "Compile OrdoPlay shader graphs into shading source")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "SHADERGEN_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the output directory
    #[arg(long, env = "SHADERGEN_GENERATED_DIR")]
    generated_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// What to run
#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init,
    /// Compile every graph once
    Build,
    /// Recompile whenever a watched file changes
    Watch {
        /// Stop after this many checks
        #[arg(long)]
        ticks: Option<u64>,
    },
}

fn init(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!("{path:?} already exists").into());
    }
    ShadergenConfig::default().save(path)?;
    tracing::info!("Wrote {path:?}");
    Ok(())
}

fn open(path: &Path, generated_dir: Option<PathBuf>) -> Result<Session, Box<dyn std::error::Error>> {
    let mut config = ShadergenConfig::load(path)?;
    if let Some(dir) = generated_dir {
        config.generated_dir = dir;
    }
    let session = Session::open(&config)?;
    tracing::debug!("Loaded {} graphs from {path:?}", session.workspace().graph_ids().len());
    Ok(session)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Init => init(&cli.config),
        Command::Build => {
            open(&cli.config, cli.generated_dir)?.build()?;
            Ok(())
        }
        Command::Watch { ticks } => {
            let mut session = open(&cli.config, cli.generated_dir)?;
            // Report a broken initial state but keep watching for a fix
            if let Err(e) = session.build() {
                tracing::error!("{e}");
            }
            session.watch(ticks)?;
            Ok(())
        }
    }
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("ordoplay_shadergen=info".parse().unwrap())
        .add_directive("ordoplay_shader_graph=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay shadergen v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(Cli::parse()) {
        tracing::error!("shadergen failed: {e}");
        std::process::exit(1);
    }
}
