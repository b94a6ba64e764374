use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use intron_cutter::logging::init_logger;

mod commands;

use commands::{
    ClassifyCommand, ExtractCommand, PairCommand, PruneCommand, RunCommand, ScanCommand,
};

/// intron-cutter: Intron candidate detection in raw genome assemblies
#[derive(Parser)]
#[command(name = "intron-cutter")]
#[command(about = "Find splice-site motif pairs and select non-overlapping intron cuts")]
#[command(version)]
struct Cli {
    /// Verbose output (shows warnings and debug info)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Log file path (optional, logs all messages including skipped records)
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Number of threads to use for parallel processing (default: number of CPU cores)
    #[arg(short = 't', long = "threads", value_name = "N", global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan scaffolds for donor and acceptor motifs
    Scan(ScanCommand),
    /// Classify a site or intron dataset
    Classify(ClassifyCommand),
    /// Pair positive donors and acceptors into intron candidates
    Pair(PairCommand),
    /// Extract intron sequences
    Extract(ExtractCommand),
    /// Resolve overlapping introns into a cut table
    Prune(PruneCommand),
    /// Run the whole chain per scaffold in parallel
    Run(RunCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.verbose, cli.log_file.as_deref())?;

    // Set up thread pool
    if let Some(threads) = cli.threads {
        if threads == 0 {
            anyhow::bail!("Thread count must be positive");
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("Failed to set thread pool: {}", e))?;
        info!("Using {} threads for parallel processing", threads);
    } else {
        let num_cpus = rayon::current_num_threads();
        info!(
            "Using {} threads for parallel processing (auto-detected)",
            num_cpus
        );
    }

    match cli.command {
        Commands::Scan(command) => command.run(),
        Commands::Classify(command) => command.run(),
        Commands::Pair(command) => command.run(),
        Commands::Extract(command) => command.run(),
        Commands::Prune(command) => command.run(),
        Commands::Run(command) => command.run(),
    }
}
