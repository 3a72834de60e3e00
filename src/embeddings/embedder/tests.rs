use super::*;
use crate::config::OpenAiConfig;

struct ConstantEmbedder(Vec<f32>);

impl Embedder for ConstantEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }

    fn dimension(&self) -> usize {
        self.0.len()
    }
}

#[test]
fn zero_vector_policy_replaces_upstream_failures() {
    let resolved = FailurePolicy::ZeroVector.resolve(
        Err(EmbeddingError::Request("quota exceeded".to_string())),
        4,
    );
    assert_eq!(resolved, Ok(vec![0.0; 4]));
}

#[test]
fn abort_policy_surfaces_upstream_failures() {
    let error = EmbeddingError::Request("timeout".to_string());
    let resolved = FailurePolicy::Abort.resolve(Err(error.clone()), 4);
    assert_eq!(resolved, Err(error));
}

#[test]
fn dimension_mismatch_is_fatal_under_every_policy() {
    for policy in [FailurePolicy::ZeroVector, FailurePolicy::Abort] {
        let resolved = policy.resolve(Ok(vec![1.0, 2.0]), 3);
        assert_eq!(
            resolved,
            Err(EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
    }
}

#[test]
fn valid_vectors_pass_through() {
    let resolved = FailurePolicy::Abort.resolve(Ok(vec![0.5, 0.25]), 2);
    assert_eq!(resolved, Ok(vec![0.5, 0.25]));
}

#[test]
fn non_finite_vectors_follow_policy() {
    for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        assert_eq!(
            FailurePolicy::ZeroVector.resolve(Ok(vec![bad, 1.0]), 2),
            Ok(vec![0.0, 0.0])
        );
        assert!(matches!(
            FailurePolicy::Abort.resolve(Ok(vec![1.0, bad]), 2),
            Err(EmbeddingError::InvalidResponse(_))
        ));
    }
}

#[test]
fn check_finite_names_offending_component() {
    assert_eq!(check_finite(vec![1.0, -2.5]), Ok(vec![1.0, -2.5]));
    assert_eq!(
        check_finite(vec![1.0, f32::NAN, 3.0]),
        Err(EmbeddingError::InvalidResponse(
            "Embedding component 1 is not finite".to_string()
        ))
    );
}

#[test]
fn batches_split_and_fail_independently() {
    let texts: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|t| t.to_string()).collect();
    let mut batch_lens = Vec::new();

    let results = embed_in_batches(&texts, 2, |batch| {
        batch_lens.push(batch.len());
        if batch.iter().any(|t| t == "c") {
            Err(EmbeddingError::Request("boom".to_string()))
        } else {
            Ok(batch.iter().map(|_| vec![1.0]).collect())
        }
    });

    assert_eq!(batch_lens, vec![2, 2, 1]);
    let failed: Vec<bool> = results.iter().map(Result::is_err).collect();
    assert_eq!(failed, vec![false, false, true, true, false]);
}

#[test]
fn embed_one_rejects_empty_response() {
    assert!(matches!(
        embed_one("x", |_| Ok(Vec::new())),
        Err(EmbeddingError::InvalidResponse(_))
    ));
    assert_eq!(embed_one("x", |_| Ok(vec![vec![2.0]])), Ok(vec![2.0]));
}

#[test]
fn only_dimension_mismatch_is_fatal() {
    assert!(
        EmbeddingError::DimensionMismatch {
            expected: 1,
            actual: 2
        }
        .is_fatal()
    );
    assert!(!EmbeddingError::Request(String::new()).is_fatal());
    assert!(!EmbeddingError::InvalidResponse(String::new()).is_fatal());
    assert!(!EmbeddingError::MissingCredentials(String::new()).is_fatal());
}

#[test]
fn default_batch_embeds_each_text() {
    let embedder = ConstantEmbedder(vec![1.0, 0.0]);
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let results = embedder.embed_batch(&texts);

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| *r == Ok(vec![1.0, 0.0])));
}

#[test]
fn arc_embedder_delegates() {
    let embedder: Arc<dyn Embedder> = Arc::new(ConstantEmbedder(vec![0.0; 3]));
    assert_eq!(embedder.dimension(), 3);
    assert_eq!(embedder.embed("x"), Ok(vec![0.0; 3]));
}

#[test]
fn failure_policy_serializes_in_snake_case() {
    let json = serde_json::to_string(&FailurePolicy::ZeroVector).expect("should serialize");
    assert_eq!(json, "\"zero_vector\"");
    let parsed: FailurePolicy = serde_json::from_str("\"abort\"").expect("should parse");
    assert_eq!(parsed, FailurePolicy::Abort);
}

#[test]
fn backend_follows_configured_provider() {
    let config = Config::default();
    let backend = EmbeddingBackend::from_config(&config).expect("ollama backend should build");
    assert_eq!(backend.provider(), EmbeddingProvider::Ollama);
    assert_eq!(backend.dimension(), config.embedding.dimension);
    assert_eq!(backend.model(), config.ollama.model);
}

#[test]
fn openai_backend_requires_credentials() {
    let mut config = Config::default();
    config.embedding.provider = EmbeddingProvider::OpenAi;
    config.openai = OpenAiConfig {
        api_key_env: "DOCBOT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
        ..OpenAiConfig::default()
    };

    assert!(EmbeddingBackend::from_config(&config).is_err());
}
