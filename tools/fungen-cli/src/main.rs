//! Fungen CLI: generate funscripts from videos.
//!
//! Usage:
//!   fungen generate <VIDEOS>...   Queue videos and wait for their funscripts
//!   fungen recommend <VIDEO>      Suggest post-processing options
//!   fungen postprocess <CSV>      Run the pipeline on a raw-signal file
//!   fungen info <FUNSCRIPT>       Show funscript statistics
//!   fungen config                 Print or write the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fungen_common::AppConfig;

mod commands;

use commands::options::{ModelArgs, OptionArgs};

#[derive(Parser)]
#[command(
    name = "fungen",
    about = "Funscript generation from per-frame motion inference",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue videos and wait until every job finishes
    Generate {
        /// Video files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        options: OptionArgs,

        /// Ignore cached raw signals and run inference again
        #[arg(long)]
        force: bool,

        /// Apply recommended options to each video before queueing
        #[arg(long)]
        recommended: bool,
    },

    /// Suggest post-processing options for a video
    Recommend {
        /// Video file
        path: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the post-processing pipeline on an existing raw-signal CSV
    Postprocess {
        /// Raw-signal CSV file
        input: PathBuf,

        /// Output funscript (defaults to the input with a .funscript extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Frame rate when the file records neither a header nor timestamps
        #[arg(long)]
        fps: Option<f64>,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Show funscript statistics
    Info {
        /// Funscript file
        path: PathBuf,
    },

    /// Print the effective configuration, or write it with --write
    Config {
        /// Write the configuration file
        #[arg(long)]
        write: bool,

        /// Start from defaults instead of the existing file
        #[arg(long)]
        defaults: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(fungen_common::config_file_path);
    let mut config = AppConfig::load_or_default(&config_path);

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    fungen_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Generate {
            paths,
            model,
            options,
            force,
            recommended,
        } => commands::generate::run(&config, paths, model, options, force, recommended).await,
        Commands::Recommend { path, model, json } => {
            commands::recommend::run(&config, path, model, json).await
        }
        Commands::Postprocess {
            input,
            output,
            fps,
            options,
        } => commands::postprocess::run(&config, input, output, fps, options),
        Commands::Info { path } => commands::info::run(path),
        Commands::Config { write, defaults } => {
            let config = if defaults { AppConfig::default() } else { config };
            commands::config::run(&config, &config_path, write)
        }
    }
}
