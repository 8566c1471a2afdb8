use anyhow::Result;
use clap::{Parser, Subcommand};
use rsndtools::{decode, extract, list};
use tracing_subscriber::EnvFilter;

/// Inspects and converts console sound containers.
#[derive(Parser)]
#[command(name = "rsnd", version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the contents of a container
    List(list::ListArgs),
    /// Convert a single container to WAV, MIDI or SF2
    Decode(decode::DecodeArgs),
    /// Unpack an archive or wave archive into a directory
    Extract(extract::ExtractArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();

    match cli.command {
        Commands::List(args) => list::execute(args),
        Commands::Decode(args) => decode::execute(args),
        Commands::Extract(args) => extract::execute(args),
    }
}
