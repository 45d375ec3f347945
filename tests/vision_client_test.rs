//! OpenAI-compatible vision client against a mock HTTP server

use std::time::Duration;

use attribute_extractor::services::vision::{
    OpenAiVisionClient, RetryPolicy, VisionError, VisionModel, VisionRequest,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn client(server: &MockServer, api_key: Option<&str>) -> OpenAiVisionClient {
    OpenAiVisionClient::new(
        format!("{}/", server.uri()),
        api_key.map(str::to_string),
        Duration::from_secs(5),
    )
    .expect("Failed to build client")
    .with_retry_policy(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
    })
}

fn request() -> VisionRequest<'static> {
    VisionRequest {
        model_id: "gpt-4o-mini",
        prompt: "Describe the garment",
        image: PNG_BYTES,
        mime_type: "image/png",
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 812, "completion_tokens": 64, "total_tokens": 876}
    })
}

#[tokio::test]
async fn test_successful_call_returns_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"color\": \"red\"}")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server, Some("test-key"))
        .analyze(request())
        .await
        .expect("call should succeed");

    assert_eq!(response.text, "{\"color\": \"red\"}");
    assert_eq!(response.usage.input_tokens, Some(812));
    assert_eq!(response.usage.output_tokens, Some(64));
    assert_eq!(response.usage.total(), 876);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let image_url = body["messages"][0]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap();
    assert!(image_url.starts_with("data:image/png;base64,"));
    assert_eq!(body["messages"][0]["content"][0]["text"], "Describe the garment");
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server, Some("test-key")).analyze(request()).await;
    assert_eq!(response.unwrap().text, "{}");
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server, Some("test-key")).analyze(request()).await.is_ok());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, Some("test-key"))
        .analyze(request())
        .await
        .unwrap_err();
    assert!(matches!(err, VisionError::Status { status, .. } if status.as_u16() == 503));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("image too large"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Some("test-key"))
        .analyze(request())
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("image too large"));
}

#[tokio::test]
async fn test_missing_credentials_skip_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, Some("   "));
    assert!(!client.is_configured());

    let err = client.analyze(request()).await.unwrap_err();
    assert!(matches!(err, VisionError::MissingCredentials));
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Some("test-key"))
        .analyze(request())
        .await
        .unwrap_err();
    assert!(matches!(err, VisionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_non_json_envelope_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, Some("test-key"))
        .analyze(request())
        .await
        .unwrap_err();
    assert!(matches!(err, VisionError::Http(_)));
    assert!(!err.is_retryable());
}
