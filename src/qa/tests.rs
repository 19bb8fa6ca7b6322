use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::index::{IndexEntry, VectorIndex};
use crate::prompt::{NO_RESPONSE, SENTINEL};
use crate::providers::ProviderError;
use tempfile::TempDir;

/// Embeds text as the share of 'a' and 'b' characters
#[derive(Default)]
struct ShareEmbedder {
    calls: AtomicUsize,
    extra_dimension: bool,
}

impl Embedder for ShareEmbedder {
    fn model_name(&self) -> &str {
        "share"
    }

    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let len = text.chars().count().max(1) as f32;
        let a = text.chars().filter(|&c| c == 'a').count() as f32;
        let b = text.chars().filter(|&c| c == 'b').count() as f32;
        let mut vector = vec![a / len, b / len];
        if self.extra_dimension {
            vector.push(0.0);
        }
        Ok(vector)
    }
}

struct RecordingGenerator {
    reply: std::result::Result<String, ProviderError>,
    max_input_tokens: Option<usize>,
    prompts: Mutex<Vec<(String, f32)>>,
}

impl RecordingGenerator {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            max_input_tokens: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().expect("lock should not be poisoned").len()
    }

    fn last_prompt(&self) -> (String, f32) {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .last()
            .cloned()
            .expect("generator should have been called")
    }
}

impl Generator for RecordingGenerator {
    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
    ) -> std::result::Result<String, ProviderError> {
        self.prompts
            .lock()
            .expect("lock should not be poisoned")
            .push((prompt.to_string(), temperature));
        self.reply.clone()
    }

    fn max_input_tokens(&self) -> Option<usize> {
        self.max_input_tokens
    }
}

fn persist_test_index(store: &IndexStore) {
    let index = VectorIndex::build(vec![
        IndexEntry {
            vector: vec![1.0, 0.0],
            text: "all about a".to_string(),
        },
        IndexEntry {
            vector: vec![0.5, 0.5],
            text: "half and half".to_string(),
        },
        IndexEntry {
            vector: vec![0.0, 1.0],
            text: "all about b".to_string(),
        },
    ])
    .expect("index should build");
    store.persist(&index, "share").expect("persist should succeed");
}

struct Fixture {
    answerer: QuestionAnswerer,
    embedder: Arc<ShareEmbedder>,
    generator: Arc<RecordingGenerator>,
    _temp_dir: TempDir,
}

fn create_fixture(
    embedder: ShareEmbedder,
    generator: RecordingGenerator,
    with_index: bool,
) -> Fixture {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = IndexStore::new(temp_dir.path());
    if with_index {
        persist_test_index(&store);
    }

    let embedder = Arc::new(embedder);
    let generator = Arc::new(generator);
    let answerer = QuestionAnswerer::new(embedder.clone(), generator.clone(), store);

    Fixture {
        answerer,
        embedder,
        generator,
        _temp_dir: temp_dir,
    }
}

#[test]
fn answers_from_retrieved_context() {
    let mut fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying("  It is about b.\n"),
        true,
    );

    let answer = fixture.answerer.ask("bbbba").expect("ask should succeed");

    assert_eq!(answer.text, "It is about b.");
    assert_eq!(fixture.answerer.state(), QaState::Answered);

    let (prompt, temperature) = fixture.generator.last_prompt();
    assert!((temperature - DEFAULT_TEMPERATURE).abs() < f32::EPSILON);
    assert!(prompt.contains("Question:\nbbbba"));

    // Nearest chunk first
    let b = prompt.find("all about b").expect("nearest chunk in prompt");
    let half = prompt.find("half and half").expect("second chunk in prompt");
    let a = prompt.find("all about a").expect("third chunk in prompt");
    assert!(b < half && half < a);
}

#[test]
fn top_k_limits_context() {
    let fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying("ok"),
        true,
    );
    let mut answerer = fixture.answerer.with_top_k(1).with_temperature(0.0);

    answerer.ask("aabbb").expect("ask should succeed");

    let (prompt, temperature) = fixture.generator.last_prompt();
    assert!(temperature.abs() < f32::EPSILON);
    assert!(prompt.contains("half and half"));
    assert!(!prompt.contains("all about a"));
    assert!(!prompt.contains("all about b"));
}

#[test]
fn sentinel_is_passed_through() {
    let mut fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying(SENTINEL),
        true,
    );

    let answer = fixture
        .answerer
        .ask("what is the capital of France?")
        .expect("ask should succeed");

    assert_eq!(answer.text, SENTINEL);
    assert!(answer.is_not_in_context());
    assert_eq!(fixture.answerer.state(), QaState::Answered);
}

#[test]
fn empty_generation_gets_fallback() {
    let mut fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying(""),
        true,
    );

    let answer = fixture.answerer.ask("a?").expect("ask should succeed");
    assert_eq!(answer.text, NO_RESPONSE);
}

#[test]
fn empty_question_is_rejected() {
    let mut fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying("unused"),
        true,
    );

    let result = fixture.answerer.ask("   ");

    assert!(matches!(result, Err(QaError::EmptyQuestion)));
    assert_eq!(
        fixture.answerer.state(),
        QaState::Failed(ErrorKind::EmptyQuestion)
    );
    assert_eq!(fixture.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.generator.calls(), 0);
}

#[test]
fn missing_index_fails_before_generation() {
    let mut fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying("unused"),
        false,
    );

    let result = fixture.answerer.ask("anything");

    assert!(matches!(result, Err(QaError::IndexNotFound(_))));
    assert_eq!(
        fixture.answerer.state(),
        QaState::Failed(ErrorKind::IndexNotFound)
    );
    assert_eq!(fixture.generator.calls(), 0);
}

#[test]
fn repeated_questions_are_not_cached() {
    let mut fixture = create_fixture(
        ShareEmbedder::default(),
        RecordingGenerator::replying("same"),
        true,
    );

    fixture.answerer.ask("ab").expect("first ask should succeed");
    fixture.answerer.ask("ab").expect("second ask should succeed");

    assert_eq!(fixture.embedder.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fixture.generator.calls(), 2);
}

#[test]
fn question_dimension_must_match_index() {
    let mut fixture = create_fixture(
        ShareEmbedder {
            extra_dimension: true,
            ..ShareEmbedder::default()
        },
        RecordingGenerator::replying("unused"),
        true,
    );

    let result = fixture.answerer.ask("ab");

    assert!(matches!(
        result,
        Err(QaError::DimensionMismatch {
            expected: 3,
            found: 2
        })
    ));
    assert_eq!(fixture.generator.calls(), 0);
}

#[test]
fn oversized_prompt_is_not_generated() {
    let generator = RecordingGenerator {
        max_input_tokens: Some(10),
        ..RecordingGenerator::replying("unused")
    };
    let mut fixture = create_fixture(ShareEmbedder::default(), generator, true);

    let result = fixture.answerer.ask("ab");

    assert!(matches!(result, Err(QaError::PromptTooLarge { limit: 10, .. })));
    assert_eq!(
        fixture.answerer.state(),
        QaState::Failed(ErrorKind::PromptTooLarge)
    );
    assert_eq!(fixture.generator.calls(), 0);
}

#[test]
fn generator_failure_is_reported() {
    let generator = RecordingGenerator {
        reply: Err(ProviderError::Unauthenticated),
        ..RecordingGenerator::replying("unused")
    };
    let mut fixture = create_fixture(ShareEmbedder::default(), generator, true);

    let result = fixture.answerer.ask("ab");

    assert!(matches!(
        result,
        Err(QaError::Provider(ProviderError::Unauthenticated))
    ));
    assert_eq!(fixture.answerer.state(), QaState::Failed(ErrorKind::Provider));
}

#[test]
fn state_display() {
    assert_eq!(QaState::EmbeddingQuestion.to_string(), "embedding question");
    assert_eq!(QaState::Answered.to_string(), "answered");
}
