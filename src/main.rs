use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pax_consolidate::config::ConsolidationConfig;
use pax_consolidate::locate::{ArtifactNaming, locate};
use pax_consolidate::pipeline::Consolidator;
use pax_consolidate::{ConsolidateError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ConsolidateError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Consolidate(args) => {
            let consolidator = Consolidator::new(load_config(args.config.as_ref())?)?;
            let outcome = consolidator.consolidate(&args.triggered_by)?;
            if args.print_dataset {
                println!("{}", serde_json::to_string_pretty(&outcome.dataset)?);
            }
            println!("{}", outcome.file_name);
            Ok(())
        }
        Command::Pax(args) => {
            let consolidator = Consolidator::new(load_config(args.config.as_ref())?)?;
            let outcome = consolidator.generate_source_pax(&args.source)?;
            println!("{}", outcome.file_name);
            Ok(())
        }
        Command::Locate(args) => {
            let naming = args
                .prefix
                .map(ArtifactNaming::new)
                .unwrap_or_default();
            match locate(&args.dir, &naming)? {
                Some(path) => println!("{}", path.display()),
                None => println!("no artifact"),
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ConsolidationConfig> {
    match path {
        Some(path) => ConsolidationConfig::from_json_file(path),
        None => Ok(ConsolidationConfig::default()),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Merge per-ship tour workbooks into one consolidated PAX report."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the consolidated artifact from every source's current document.
    Consolidate(ConsolidateArgs),
    /// Render the single-source PAX report of one source.
    Pax(PaxArgs),
    /// Print the path of the current consolidated artifact.
    Locate(LocateArgs),
}

#[derive(clap::Args)]
struct ConsolidateArgs {
    /// JSON configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source whose update triggered this run.
    #[arg(long)]
    triggered_by: String,

    /// Print the merged dataset as JSON before the file name.
    #[arg(long)]
    print_dataset: bool,
}

#[derive(clap::Args)]
struct PaxArgs {
    /// JSON configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source to report on.
    #[arg(long)]
    source: String,
}

#[derive(clap::Args)]
struct LocateArgs {
    /// Directory holding consolidated artifacts.
    #[arg(long)]
    dir: PathBuf,

    /// Artifact file name prefix.
    #[arg(long)]
    prefix: Option<String>,
}
