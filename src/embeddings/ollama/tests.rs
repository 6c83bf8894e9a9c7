use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dimension: u32) -> Config {
    let mut config = Config::default();
    config.ollama.host = "127.0.0.1".to_string();
    config.ollama.port = server.address().port();
    config.ollama.embedding_model = "test-embed".to_string();
    config.ollama.embedding_dimension = dimension;
    config
}

#[test]
fn client_configuration() {
    let mut config = Config::default();
    config.ollama.host = "test-host".to_string();
    config.ollama.port = 1234;
    config.ollama.embedding_model = "test-model".to_string();
    config.ollama.batch_size = 128;

    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.dimension, DEFAULT_EMBEDDING_DIMENSION as usize);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&Config::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_in_configured_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["a", "b"] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["c"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.0, 0.0, 1.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, 3);
    config.ollama.batch_size = 2;
    let client = OllamaClient::new(&config).expect("client");

    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = tokio::task::spawn_blocking(move || client.embed(&texts))
        .await
        .expect("join")
        .expect("embeddings");

    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[2], vec![0.0, 0.0, 1.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_unexpected_dimension() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0]] })),
        )
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3)).expect("client");

    let result = tokio::task::spawn_blocking(move || client.embed_one("hello"))
        .await
        .expect("join");

    let err = result.expect_err("dimension mismatch should fail");
    assert!(matches!(err, CampusError::Embedding(_)));
    assert!(err.to_string().contains("embedding_dimension"));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3))
        .expect("client")
        .with_retry_attempts(3);

    let result = tokio::task::spawn_blocking(move || client.embed_one("hello"))
        .await
        .expect("join");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "test-embed", "size": 1024, "digest": "abc" },
                { "name": "llama3.2:1b" }
            ]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, 3);
    let present = OllamaClient::new(&config).expect("client");

    let mut missing_config = config.clone();
    missing_config.ollama.embedding_model = "nomic-embed-text".to_string();
    let missing = OllamaClient::new(&missing_config).expect("client");

    let (present, missing) = tokio::task::spawn_blocking(move || {
        (present.health_check(), missing.health_check())
    })
    .await
    .expect("join");

    assert!(present.is_ok());
    let err = missing.expect_err("missing model");
    assert!(err.to_string().contains("nomic-embed-text"));
}

#[test]
fn empty_input_skips_network() {
    let mut config = Config::default();
    config.ollama.port = 1;
    let client = OllamaClient::new(&config).expect("client");

    let vectors = client.embed(&[]).expect("no request is made");
    assert!(vectors.is_empty());
}
