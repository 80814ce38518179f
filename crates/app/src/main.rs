use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "releve", version, about = "Turn bank statement scans and PDFs into structured data")]
struct Cli {
    /// Config file (defaults to ./releve.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Join fragments with single spaces instead of reconstructing column gaps
    #[arg(long, global = true)]
    no_spacing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layout-preserving transcript of a statement
    Transcribe {
        /// Image (png, jpg, jpeg) or PDF file
        input_file: PathBuf,
    },
    /// Transcribe, extract with the LLM, and write JSON, CSV and xlsx outputs
    Process {
        input_file: PathBuf,
        /// Output directory
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Process every statement dropped into a directory
    Watch {
        dir: PathBuf,
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.no_spacing {
        config.layout.reconstruct_spacing = false;
    }

    match cli.command {
        Commands::Transcribe { input_file } => {
            let text = commands::transcribe(&config, &input_file).await?;
            println!("{text}");
        }
        Commands::Process { input_file, out } => {
            commands::process(&config, &input_file, &out).await?;
        }
        Commands::Watch { dir, out } => {
            commands::watch(&config, &dir, &out).await?;
        }
    }
    Ok(())
}
