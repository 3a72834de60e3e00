use super::*;
use crate::config::OpenAiConfig;

fn test_config(base_url: &str) -> Config {
    let mut config = Config {
        openai: OpenAiConfig {
            base_url: base_url.to_string(),
            batch_size: 8,
            ..OpenAiConfig::default()
        },
        ..Config::default()
    };
    config.embedding.dimension = 3072;
    config
}

#[test]
fn endpoint_is_joined_onto_base_url() {
    let client = OpenAiClient::with_api_key(
        &test_config("https://api.openai.com/v1"),
        "sk-test".to_string(),
    )
    .expect("client should build");
    assert_eq!(
        client.endpoint().as_str(),
        "https://api.openai.com/v1/embeddings"
    );

    let client = OpenAiClient::with_api_key(
        &test_config("http://localhost:8080/v1/"),
        "sk-test".to_string(),
    )
    .expect("client should build");
    assert_eq!(
        client.endpoint().as_str(),
        "http://localhost:8080/v1/embeddings"
    );
}

#[test]
fn client_configuration() {
    let client = OpenAiClient::with_api_key(
        &test_config("https://api.openai.com/v1/"),
        "sk-test".to_string(),
    )
    .expect("client should build");

    assert_eq!(client.model(), "text-embedding-3-large");
    assert_eq!(client.batch_size, 8);
    assert_eq!(client.dimension(), 3072);
}

#[test]
fn debug_output_hides_api_key() {
    let client = OpenAiClient::with_api_key(
        &test_config("https://api.openai.com/v1/"),
        "sk-secret".to_string(),
    )
    .expect("client should build");
    let debug = format!("{:?}", client);

    assert!(!debug.contains("sk-secret"));
    assert!(debug.contains("text-embedding-3-large"));
}

#[test]
fn request_carries_requested_dimensions() {
    let inputs = vec!["hello".to_string()];
    let request = EmbeddingsRequest {
        model: "text-embedding-3-large",
        input: &inputs,
        dimensions: 3072,
    };

    let json = serde_json::to_value(&request).expect("should serialize request");
    assert_eq!(json["dimensions"], 3072);
    assert_eq!(json["input"][0], "hello");
}

#[test]
fn missing_api_key_is_reported() {
    let mut config = test_config("https://api.openai.com/v1/");
    config.openai.api_key_env = "DOCBOT_UNSET_OPENAI_KEY_FOR_TESTS".to_string();

    let error = OpenAiClient::new(&config).expect_err("client should not build without a key");
    assert!(error.to_string().contains("DOCBOT_UNSET_OPENAI_KEY_FOR_TESTS"));
}
