use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pdf_qa::Result;
use pdf_qa::commands::{ask_question, interactive_session, process_documents, show_status};
use pdf_qa::config::{Config, get_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "pdf-qa")]
#[command(about = "Ask questions over your PDF documents using Gemini")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration and the persisted index
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the Gemini connection and pipeline settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk and embed documents, replacing the current index
    Process {
        /// PDF (or plain text) files to process
        files: Vec<PathBuf>,
    },
    /// Ask a question about the processed documents
    Ask {
        /// Question to answer. Starts an interactive session when omitted.
        question: Option<String>,
    },
    /// Show the data directory, credential and index status
    Status,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Process { files } => {
            process_documents(&Config::load(&base_dir)?, &files)?;
        }
        Commands::Ask { question } => {
            let config = Config::load(&base_dir)?;
            match question {
                Some(question) => ask_question(&config, &question)?,
                None => interactive_session(&config)?,
            }
        }
        Commands::Status => {
            show_status(&Config::load(&base_dir)?)?;
        }
    }

    Ok(())
}
