//! Forma CLI — topology optimization of mass-spring lattices.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "forma")]
#[command(version, about = "Forma — topology optimization for mass-spring lattices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an optimization from a design file.
    Run {
        /// Path to the design document (JSON).
        design: String,

        /// Output directory for metrics and the exported STL.
        #[arg(short, long, default_value = "data")]
        output: String,

        /// RNG seed.
        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        /// Maximum driver ticks before giving up.
        #[arg(short, long, default_value_t = 200_000)]
        max_ticks: u64,
    },

    /// Parse a design document and report unresolved references.
    Validate {
        /// Path to the design document.
        path: String,
    },

    /// Summarize a binary state snapshot.
    Inspect {
        /// Path to the snapshot file.
        path: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            design,
            output,
            seed,
            max_ticks,
        } => commands::run(&design, &output, seed, max_ticks),
        Commands::Validate { path } => commands::validate(&path),
        Commands::Inspect { path } => commands::inspect(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
