use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Chat-completion body whose single choice carries `content`.
pub fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

/// Creates a mock chat-completion server that answers every authorized POST with `content`.
pub async fn mock_chat_server(api_key: &str, content: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", format!("Bearer {}", api_key).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(content)))
        .mount(&server)
        .await;

    server
}

/// Creates a mock server that returns the given HTTP status for every POST.
pub async fn mock_chat_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(status_code).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    server
}

pub fn chat_endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), CHAT_PATH)
}
