//! Kiln CLI - Command-line interface for the Kiln asset pipeline

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{build, check, list};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Declarative asset import pipelines", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline.json in a directory over the files next to it
    Build {
        /// Directory holding pipeline.json and its sources
        dir: String,

        /// Content store root (defaults to the build settings)
        #[arg(long)]
        store: Option<String>,

        /// Number of parallel workers
        #[arg(long, short)]
        jobs: Option<usize>,
    },

    /// Parse and validate a pipeline document
    Check {
        /// Path to pipeline.json
        path: String,
    },

    /// List artifacts in a content store
    List {
        /// Content store root (defaults to the build settings)
        #[arg(long)]
        store: Option<String>,

        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,

        /// Filter by kind (prefab, mesh, material, texture, animation, collider, decal, audio)
        #[arg(long)]
        kind: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { dir, store, jobs } => build::run(build::BuildArgs { dir, store, jobs }),
        Commands::Check { path } => check::run(&path),
        Commands::List {
            store,
            tag,
            kind,
            format,
        } => list::run(list::ListArgs {
            store,
            tag,
            kind,
            format,
        }),
    }
}
