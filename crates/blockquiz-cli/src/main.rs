//! blockquiz CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "blockquiz", version, about = "Adaptive quiz block and condition engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check quiz files for structural errors and authoring mistakes
    Validate {
        /// Path to .toml quiz file or directory
        #[arg(long)]
        quiz: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the block tree of a quiz
    Outline {
        /// Path to .toml quiz file
        #[arg(long)]
        quiz: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Evaluate a recorded attempt against a quiz
    Simulate {
        /// Path to .toml quiz file
        #[arg(long)]
        quiz: PathBuf,

        /// Path to .toml attempt file
        #[arg(long)]
        attempt: PathBuf,

        /// Show feedback for this domain besides the global feedback
        #[arg(long)]
        domain: Option<String>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the JSON report to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config, quiz and attempt
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blockquiz=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { quiz, config } => commands::validate::execute(quiz, config),
        Commands::Outline { quiz, config } => commands::outline::execute(quiz, config),
        Commands::Simulate {
            quiz,
            attempt,
            domain,
            format,
            output,
            config,
        } => commands::simulate::execute(quiz, attempt, domain, format, output, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
