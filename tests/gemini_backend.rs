use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use kuku::config::{Config, LlmConfig, Mode};
use kuku::relay::{
    BackendError, GeminiClient, GenerationParams, PromptEnvelope, PromptTemplate, QueryPipeline,
    QuestionValidator, TextGenerator,
};
use serde_json::{Value, json};
use std::sync::Arc;

async fn mock_generate(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "code": 403, "message": "API key not valid" } })),
        );
    }

    let user_text = body["contents"]
        .as_array()
        .and_then(|turns| turns.last())
        .and_then(|turn| turn["parts"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string();
    let max_tokens = body["generationConfig"]["maxOutputTokens"].clone();

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": format!("1. Echo: {user_text}\n") },
                        { "text": format!("2. Tokens: {max_tokens}\nChat ends.") }
                    ]
                }
            }]
        })),
    )
}

async fn spawn_mock_gemini_server() -> String {
    let app = Router::new().route("/v1beta/models/{model}", post(mock_generate));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn llm_config(base_url: &str, api_key: &str) -> LlmConfig {
    LlmConfig {
        base_url: base_url.to_string(),
        api_key: api_key.to_string(),
        ..LlmConfig::default()
    }
}

fn envelope(question: &str) -> PromptEnvelope {
    let config = Config::default();
    let question = QuestionValidator::new(vec!["message".into()], 2)
        .validate(&json!({ "message": question }))
        .unwrap();
    PromptTemplate::new(&config.prompt).build(&question)
}

#[tokio::test]
async fn gemini_client_sends_envelope_and_params() {
    let base_url = spawn_mock_gemini_server().await;
    let client = GeminiClient::new(&llm_config(&base_url, "test-key")).unwrap();
    let params = GenerationParams::from(&LlmConfig::default());

    let text = client.generate(&envelope("Dawa"), &params).await.unwrap();

    assert_eq!(
        text,
        "1. Echo: SWALI: Dawa\nJIBU kwa: 1) Ushauri, 2) Nyongeza, 3) Tahadhari\n2. Tokens: 120\nChat ends."
    );
}

#[tokio::test]
async fn gemini_client_surfaces_api_error_message() {
    let base_url = spawn_mock_gemini_server().await;
    let client = GeminiClient::new(&llm_config(&base_url, "wrong-key")).unwrap();
    let params = GenerationParams::from(&LlmConfig::default());

    let err = client.generate(&envelope("Dawa"), &params).await.unwrap_err();

    match err {
        BackendError::Status { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn gemini_client_reports_unreachable_backend() {
    let client = GeminiClient::new(&llm_config("http://127.0.0.1:1", "test-key")).unwrap();
    let params = GenerationParams::from(&LlmConfig::default());

    let err = client.generate(&envelope("Dawa"), &params).await.unwrap_err();

    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn pipeline_over_gemini_client_normalizes_answer() {
    let base_url = spawn_mock_gemini_server().await;
    let mut config = Config::default();
    config.llm = llm_config(&base_url, "test-key");
    config.prompt.question_frame = None;
    let client = GeminiClient::new(&config.llm).unwrap();
    let pipeline = QueryPipeline::new(&config, Arc::new(client));

    let out = pipeline
        .handle(&json!({ "message": "Chanjo ya Newcastle" }))
        .await
        .unwrap();

    assert_eq!(out.response, "Echo: Chanjo ya Newcastle\nTokens: 120");
}

#[tokio::test]
async fn unreachable_backend_details_are_the_transport_message() {
    let mut config = Config::default();
    config.mode = Mode::Development;
    config.llm = llm_config("http://127.0.0.1:1", "test-key");
    let client = GeminiClient::new(&config.llm).unwrap();

    let transport = match client
        .generate(&envelope("Dawa ya kifaranga"), &GenerationParams::from(&config.llm))
        .await
    {
        Err(BackendError::Transport(e)) => e.to_string(),
        other => panic!("expected transport error, got {other:?}"),
    };

    let pipeline = QueryPipeline::new(&config, Arc::new(client));
    let err = pipeline
        .handle(&json!({ "message": "Dawa ya kifaranga" }))
        .await
        .unwrap_err();

    let details = err.details.expect("development mode exposes details");
    assert_eq!(details, transport);
    assert!(details.starts_with("error sending request"), "{details}");
    assert!(!details.starts_with("Request to generation backend failed"));
}
