
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{ApiKey, Embedder, Generator, ProviderError};
use crate::config::{ConfigError, ProviderConfig};

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const MODELS_PAGE_SIZE: u32 = 1000;

/// Client for the Google Generative Language API, serving both embeddings and
/// answer generation
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    api_key: Option<ApiKey>,
    batch_size: usize,
    max_input_tokens: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(rename = "inputTokenLimit")]
    pub input_token_limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: Option<u16>,
    pub message: String,
    pub status: Option<String>,
}

impl GeminiClient {
    /// Create a client from provider settings. A missing `api_key` is not an
    /// error here; every request made without one fails with
    /// [`ProviderError::Unauthenticated`].
    #[inline]
    pub fn new(config: &ProviderConfig, api_key: Option<ApiKey>) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            base_url: config.base_url()?,
            embedding_model: model_path(&config.embedding_model),
            generation_model: model_path(&config.generation_model),
            api_key,
            batch_size: config.batch_size as usize,
            max_input_tokens: config.max_input_tokens,
            agent: build_agent(config.timeout()),
            retry_attempts: config.retry_attempts,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(Some(timeout));
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Verify the API is reachable, the credential is accepted, both
    /// configured models exist and the generation model accepts prompts of
    /// the configured size
    #[inline]
    pub fn health_check(&self) -> Result<(), ProviderError> {
        debug!("Performing health check against {}", self.base_url);

        let models = self.list_models()?;
        self.check_models(&models)?;

        info!(
            "Health check passed for {} with models {} and {}",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    fn check_models(&self, models: &[ModelInfo]) -> Result<(), ProviderError> {
        for wanted in [&self.embedding_model, &self.generation_model] {
            if !models.iter().any(|m| &m.name == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                return Err(ProviderError::InvalidResponse(format!(
                    "model '{}' is not available",
                    wanted
                )));
            }
        }

        let limit = models
            .iter()
            .find(|m| m.name == self.generation_model)
            .and_then(|m| m.input_token_limit);
        if let Some(limit) = limit {
            if self.max_input_tokens as u64 > limit {
                warn!(
                    "Configured max_input_tokens {} exceeds the {} limit of {}",
                    self.max_input_tokens, self.generation_model, limit
                );
                return Err(ProviderError::InvalidResponse(format!(
                    "model '{}' accepts at most {} input tokens, {} configured",
                    self.generation_model, limit, self.max_input_tokens
                )));
            }
        }

        Ok(())
    }

    /// List all models visible to the credential
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut url = self.endpoint("models")?;
        url.query_pairs_mut()
            .append_pair("pageSize", &MODELS_PAGE_SIZE.to_string());

        debug!("Fetching available models from {}", url);

        let api_key = self.require_api_key()?;
        let response_text = self.request_with_retry(&url, || {
            self.agent
                .get(url.as_str())
                .header(API_KEY_HEADER, api_key.expose())
                .call()
                .and_then(read_reply)
        })?;

        let models_response: ModelsResponse = parse_body(&response_text, "models")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn embed_with_task(&self, text: &str, task_type: TaskType) -> Result<Vec<f32>, ProviderError> {
        debug!(
            "Generating {:?} embedding for text (length: {})",
            task_type,
            text.len()
        );

        let request = EmbedContentRequest {
            model: &self.embedding_model,
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
            task_type,
        };

        let url = self.endpoint(&format!("{}:embedContent", self.embedding_model))?;
        let response_text = self.post_json(&url, &request)?;
        let response: EmbedContentResponse = parse_body(&response_text, "embedding")?;

        let vector = response.embedding.values;
        if vector.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "embedding has no values".to_string(),
            ));
        }

        debug!("Generated embedding with {} dimensions", vector.len());
        Ok(vector)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if let [text] = texts {
            return Ok(vec![self.embed_with_task(text, TaskType::RetrievalDocument)?]);
        }

        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.embedding_model,
                    content: Content {
                        role: None,
                        parts: vec![Part { text }],
                    },
                    task_type: TaskType::RetrievalDocument,
                })
                .collect(),
        };

        let url = self.endpoint(&format!("{}:batchEmbedContents", self.embedding_model))?;
        let response_text = self.post_json(&url, &request)?;
        let response: BatchEmbedContentsResponse = parse_body(&response_text, "batch embedding")?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect();

        if vectors.iter().any(Vec::is_empty) {
            return Err(ProviderError::InvalidResponse(
                "batch contains an embedding without values".to_string(),
            ));
        }

        Ok(vectors)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(&format!("{}/{}", API_VERSION, path))
            .map_err(|e| ProviderError::Network(format!("failed to build request URL: {}", e)))
    }

    fn require_api_key(&self) -> Result<&ApiKey, ProviderError> {
        self.api_key.as_ref().ok_or_else(|| {
            warn!("No API key configured, refusing to call {}", self.base_url);
            ProviderError::Unauthenticated
        })
    }

    fn post_json<T: Serialize>(&self, url: &Url, body: &T) -> Result<String, ProviderError> {
        let api_key = self.require_api_key()?;
        let request_json = serde_json::to_string(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to serialize request: {}", e))
        })?;

        self.request_with_retry(url, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header(API_KEY_HEADER, api_key.expose())
                .send(&request_json)
                .and_then(read_reply)
        })
    }

    fn request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String, ProviderError>
    where
        F: FnMut() -> Result<(u16, String), ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            let error = match request_fn() {
                Ok((status, body)) => match check_status(status, &body) {
                    Ok(()) => {
                        debug!("Request succeeded on attempt {}", attempt);
                        return Ok(body);
                    }
                    Err(error) => error,
                },
                Err(error) => {
                    warn!("Transport error: {}", error);
                    ProviderError::Network(error.to_string())
                }
            };

            if !is_retryable(&error) {
                warn!("Non-retryable error from {}: {}", url, error);
                return Err(error);
            }

            warn!(
                "Request to {} failed: {}, attempt {}/{}",
                url, error, attempt, self.retry_attempts
            );
            last_error = Some(error);

            if attempt < self.retry_attempts {
                let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                let delay = Duration::from_millis(delay_ms);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        if self.retry_attempts > 1 {
            error!("All retry attempts failed for request to {}", url);
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::Network("request was never attempted".to_string())))
    }
}

impl Embedder for GeminiClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_with_task(text, TaskType::RetrievalDocument)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            vectors.extend(self.embed_single_batch(batch)?);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    fn embed_query(&self, question: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_with_task(question, TaskType::RetrievalQuery)
    }
}

impl Generator for GeminiClient {
    fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        debug!(
            "Generating answer with {} (prompt length: {}, temperature: {})",
            self.generation_model,
            prompt.len(),
            temperature
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature },
        };

        let url = self.endpoint(&format!("{}:generateContent", self.generation_model))?;
        let response_text = self.post_json(&url, &request)?;
        let response: GenerateContentResponse = parse_body(&response_text, "generation")?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .map_or_else(
                    || "response contains no candidates".to_string(),
                    |reason| format!("prompt was blocked: {}", reason),
                );
            return Err(ProviderError::InvalidResponse(reason));
        };

        if let Some(reason) = &candidate.finish_reason {
            debug!("Generation finished with reason {}", reason);
        }

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        debug!("Generated {} chars", text.len());
        Ok(text)
    }

    fn max_input_tokens(&self) -> Option<usize> {
        Some(self.max_input_tokens)
    }
}

fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(timeout)
        .http_status_as_error(false)
        .build()
        .into()
}

/// Models are addressed as `models/<name>`; accept the bare name as well
fn model_path(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn read_reply(mut response: ureq::http::Response<ureq::Body>) -> Result<(u16, String), ureq::Error> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    Ok((status, body))
}

/// Map an HTTP status (and the API's error body) to a provider error
fn check_status(status: u16, body: &str) -> Result<(), ProviderError> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    let detail = serde_json::from_str::<ErrorResponse>(body).ok();
    if let Some(detail) = &detail {
        warn!(
            "Provider returned HTTP {}: {} ({})",
            status,
            detail.error.message,
            detail.error.status.as_deref().unwrap_or("unknown")
        );
    }

    let invalid_key = detail
        .as_ref()
        .is_some_and(|d| d.error.message.contains("API key"))
        || body.contains("API_KEY_INVALID");

    Err(match status {
        401 | 403 => ProviderError::Unauthenticated,
        400 if invalid_key => ProviderError::Unauthenticated,
        429 => ProviderError::QuotaExceeded,
        other => ProviderError::Status(other),
    })
}

/// Only transient failures are worth another attempt
fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::QuotaExceeded | ProviderError::Network(_) => true,
        ProviderError::Status(status) => *status >= 500,
        ProviderError::Unauthenticated | ProviderError::InvalidResponse(_) => false,
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str, what: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse {} response: {}", what, e)))
}
