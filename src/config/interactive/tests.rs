use super::load_existing_config as load_existing_config_impl;
use super::non_empty;

#[test]
fn load_existing_config() {
    let config = load_existing_config_impl().expect("config loaded successfully");
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.ollama.embedding_model.is_empty());
    assert!(config.retrieval.top_k > 0);
}

#[test]
fn non_empty_validator() {
    assert!(non_empty(&"llama3.2:1b".to_string()).is_ok());
    assert!(non_empty(&String::new()).is_err());
    assert!(non_empty(&"   ".to_string()).is_err());
}
