use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::QaError;
use crate::config::Config;
use crate::extractor::{DocumentExtractor, SourceDocument};
use crate::index::IndexStore;
use crate::indexer::Indexer;
use crate::prompt::Answer;
use crate::providers::GeminiClient;
use crate::qa::QuestionAnswerer;

/// Build the Gemini client once from configuration and the environment
#[inline]
pub fn build_client(config: &Config) -> Result<Arc<GeminiClient>> {
    let api_key = config.api_key();
    if api_key.is_none() {
        warn!(
            "{} is not set, requests to the provider will be rejected",
            config.provider.api_key_env
        );
    }

    let client = GeminiClient::new(&config.provider, api_key)
        .context("Invalid provider configuration")?;
    Ok(Arc::new(client))
}

/// Extract, chunk and embed `paths`, replacing the persisted index
#[inline]
pub fn process_documents(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let documents = paths
        .iter()
        .map(|path| {
            SourceDocument::from_path(path)
                .with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let client = build_client(config)?;
    let mut indexer = Indexer::new(
        Arc::new(DocumentExtractor),
        client,
        IndexStore::new(config.get_base_dir()),
        config.chunking,
    );

    let bar = spinner("Processing the documents");
    let result = indexer.process(&documents);
    bar.finish_and_clear();

    match result {
        Ok(report) => {
            println!("{}", style("✓ Done").green().bold());
            println!("  Documents: {}", report.documents);
            println!("  Characters: {}", report.characters);
            println!("  Chunks: {}", report.chunks);
            println!("  Embedding Dimension: {}", report.dimension);
            println!("  Index: {}", report.location.display());
            Ok(())
        }
        Err(QaError::NoDocuments) => {
            eprintln!("{}", style("Please upload PDF files first").red());
            Ok(())
        }
        Err(e) => Err(e).context("Failed to process documents"),
    }
}

fn create_answerer(config: &Config) -> Result<QuestionAnswerer> {
    let client = build_client(config)?;
    Ok(QuestionAnswerer::new(
        client.clone(),
        client,
        IndexStore::new(config.get_base_dir()),
    )
    .with_top_k(config.retrieval.top_k)
    .with_temperature(config.provider.temperature))
}

/// Answer a single question and print it
#[inline]
pub fn ask_question(config: &Config, question: &str) -> Result<()> {
    let mut answerer = create_answerer(config)?;
    let answer = answer_with_spinner(&mut answerer, question)?;
    print_answer(&answer);
    Ok(())
}

/// Prompt for questions until an empty line is entered
#[inline]
pub fn interactive_session(config: &Config) -> Result<()> {
    let mut answerer = create_answerer(config)?;

    eprintln!(
        "{}",
        style("Ask a question about your documents. Submit an empty line to quit.").dim()
    );

    loop {
        let question: String = Input::new()
            .with_prompt("Ask a Question from the PDF files")
            .allow_empty(true)
            .interact_text()?;

        if question.trim().is_empty() {
            break;
        }

        match answer_with_spinner(&mut answerer, &question) {
            Ok(answer) => print_answer(&answer),
            Err(QaError::IndexNotFound(_)) => {
                eprintln!(
                    "{}",
                    style("No documents have been processed yet. Run 'pdf-qa process <FILES>' first.")
                        .red()
                );
                break;
            }
            Err(e) => eprintln!("{} {}", style("Error:").red().bold(), e),
        }
    }

    Ok(())
}

/// Show the data directory, credential and persisted index
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("📊 PDF Q&A Status");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Data Directory: {}", config.get_base_dir().display());

    if config.api_key().is_some() {
        println!("🔑 API Key ({}): ✅ set", config.provider.api_key_env);
    } else {
        println!("🔑 API Key ({}): ❌ missing", config.provider.api_key_env);
    }

    println!();
    println!("🔍 Index Status:");
    let store = IndexStore::new(config.get_base_dir());
    match store.read_manifest() {
        Ok(manifest) => {
            println!("   ✅ Index: {}", store.location().display());
            println!("   📄 Chunks: {}", manifest.entries);
            println!("   🔢 Dimension: {}", manifest.dimension);
            println!("   🤖 Embedding Model: {}", manifest.embedding_model);
            println!(
                "   🕒 Created: {}",
                manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            let configured = config.provider.embedding_model.trim_start_matches("models/");
            if manifest.embedding_model.trim_start_matches("models/") != configured {
                println!(
                    "   ⚠️  Configured embedding model is {}, reprocess documents before asking",
                    config.provider.embedding_model
                );
            }
        }
        Err(QaError::IndexNotFound(_)) => {
            println!("   ❌ No index yet. Run 'pdf-qa process <FILES>' to build one.");
        }
        Err(e) => {
            println!("   ⚠️  Index unreadable: {}", e);
        }
    }

    Ok(())
}

fn answer_with_spinner(
    answerer: &mut QuestionAnswerer,
    question: &str,
) -> crate::Result<Answer> {
    let bar = spinner("Thinking");
    let result = answerer.ask(question);
    bar.finish_and_clear();

    if let Ok(answer) = &result {
        info!("Answer ready ({} chars)", answer.text.chars().count());
    }
    result
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", style("Answer:").bold().underlined());
    println!("{}", answer);
    println!();
}

fn spinner(message: &'static str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
