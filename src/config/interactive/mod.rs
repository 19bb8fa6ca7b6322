
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, ConfigError, ProviderConfig};
use crate::chunking::ChunkingConfig;
use crate::providers::GeminiClient;

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 PDF Q&A Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir)?;

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the Gemini API used for embeddings and answers.");
    eprintln!();

    configure_provider(&mut config.provider)?;

    eprintln!();
    eprintln!("{}", style("Pipeline Configuration").bold().yellow());
    eprintln!("Configure how documents are split and how much context is retrieved.");
    eprintln!();

    configure_pipeline(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match test_provider_connection(&config) {
        Some(true) => eprintln!("{}", style("✓ Provider connection successful!").green()),
        Some(false) => {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not reach the provider or the models are unavailable")
                    .yellow()
            );
            eprintln!("You can continue, but check your settings before processing documents.");
        }
        None => {
            eprintln!(
                "{}",
                style(format!(
                    "⚠ Warning: {} is not set, provider calls will be rejected",
                    config.provider.api_key_env
                ))
                .yellow()
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    match config.provider.base_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.provider.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.provider.generation_model).cyan()
    );
    eprintln!("  Temperature: {}", style(config.provider.temperature).cyan());
    eprintln!("  Batch Size: {}", style(config.provider.batch_size).cyan());
    eprintln!(
        "  Timeout: {}",
        style(
            config
                .provider
                .timeout_seconds
                .map_or_else(|| "none".to_string(), |s| format!("{}s", s))
        )
        .cyan()
    );
    eprintln!(
        "  Attempts per Request: {}",
        style(config.provider.retry_attempts).cyan()
    );
    let key_state = if config.api_key().is_some() {
        style("set").green()
    } else {
        style("missing").red()
    };
    eprintln!(
        "  API Key ({}): {}",
        config.provider.api_key_env, key_state
    );

    eprintln!();
    eprintln!("{}", style("Pipeline Settings:").bold().yellow());
    eprintln!(
        "  Max Chunk Size: {} chars",
        style(config.chunking.max_chunk_size).cyan()
    );
    eprintln!(
        "  Chunk Overlap: {} chars",
        style(config.chunking.overlap_size).cyan()
    );
    eprintln!("  Retrieved Chunks: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(base_dir: &Path) -> Result<Config> {
    let config_exists = base_dir.join("config.toml").exists();
    Config::load(base_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("Existing configuration is invalid. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: base_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            if config_exists {
                eprintln!("{}", style("Found existing configuration.").green());
            } else {
                eprintln!(
                    "{}",
                    style("No existing configuration found. Using defaults.").yellow()
                );
            }
            Ok(config)
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ProviderConfig {
                base_url: input.clone(),
                ..ProviderConfig::default()
            };
            temp_config.base_url()?;
            Ok(())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(provider.generation_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(provider.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(provider.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 100 {
                Err("Batch size must be 100 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    provider.set_base_url(base_url)?;
    provider.set_embedding_model(embedding_model)?;
    provider.set_generation_model(generation_model)?;
    provider.set_temperature(temperature)?;
    provider.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_pipeline(config: &mut Config) -> Result<()> {
    let max_chunk_size: usize = Input::new()
        .with_prompt("Maximum chunk size (chars)")
        .default(config.chunking.max_chunk_size)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig {
                max_chunk_size: *input,
                overlap_size: 0,
            }
            .validate()
        })
        .interact_text()?;

    let overlap_size: usize = Input::new()
        .with_prompt("Chunk overlap (chars)")
        .default(config.chunking.overlap_size.min(max_chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig {
                max_chunk_size,
                overlap_size: *input,
            }
            .validate()
        })
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    config.chunking = ChunkingConfig {
        max_chunk_size,
        overlap_size,
    };
    config.retrieval.top_k = top_k;

    Ok(())
}

/// `None` when no credential is available to test with
fn test_provider_connection(config: &Config) -> Option<bool> {
    let api_key = config.api_key()?;

    let client = match GeminiClient::new(&config.provider, Some(api_key)) {
        Ok(client) => client.with_timeout(std::time::Duration::from_secs(10)),
        Err(_) => return Some(false),
    };

    Some(client.health_check().is_ok())
}
