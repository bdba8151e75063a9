//! Mock tests for the Gemini invoker
//!
//! These tests use WireMock to simulate the Gemini API and verify that the
//! invoker sends the expected request and classifies provider failures.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::PipelineConfig;
    use crate::error::{Confidence, ErrorKind};
    use crate::invoker::{GeminiInvoker, InvokeOptions, ModelInvoker};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    /// Sets up a mock Gemini server
    async fn setup_mock_server() -> MockServer {
        MockServer::start().await
    }

    /// Creates a test invoker configured to use the mock server
    fn create_test_invoker(mock_server: &MockServer) -> GeminiInvoker {
        let config = PipelineConfig {
            api_key: "mock_gemini_api_key".to_string(),
            base_url: format!("{}/v1beta", mock_server.uri()),
            ..PipelineConfig::default()
        };
        GeminiInvoker::new(&config).expect("Failed to build Gemini invoker")
    }

    fn options() -> InvokeOptions {
        InvokeOptions::new(Duration::from_secs(5))
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "mock_gemini_api_key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "Hola"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("```json\n{}\n```")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let completion = assert_ok!(invoker.invoke("Hola", options()).await);

        // raw text is returned exactly as received
        assert_eq!(completion.text, "```json\n{}\n```");
        assert!(completion.sources.is_empty());
    }

    #[tokio::test]
    async fn test_grounding_tool_and_sources() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_partial_json(json!({"tools": [{"googleSearch": {}}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"a\":1}"}]},
                    "groundingMetadata": {
                        "groundingChunks": [
                            {"web": {"uri": "https://www.df.cl/mercados", "title": "df.cl"}},
                            {"web": {"uri": "https://emol.com"}}
                        ]
                    }
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let completion = invoker
            .invoke("Analiza", options().with_grounding(true))
            .await
            .unwrap();

        assert_eq!(completion.sources.len(), 2);
        assert_eq!(completion.sources[0].title, "df.cl");
        assert_eq!(completion.sources[0].uri, "https://www.df.cl/mercados");
        assert_eq!(completion.sources[1].title, "Fuente de mercado");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "17")
                    .set_body_json(json!({
                        "error": {
                            "code": 429,
                            "message": "Resource has been exhausted (e.g. check quota).",
                            "status": "RESOURCE_EXHAUSTED"
                        }
                    })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let err = assert_err!(invoker.invoke("Hola", options()).await);

        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.retry_after, Some(Duration::from_secs(17)));
        assert_eq!(err.confidence, Confidence::Structured);
        assert!(err.retriable);
    }

    #[tokio::test]
    async fn test_invalid_api_key_reported_as_400() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{"reason": "API_KEY_INVALID", "domain": "googleapis.com"}]
                }
            })))
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let err = invoker.invoke("Hola", options()).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::AuthError);
        assert_eq!(err.status_code, Some(400));
        assert!(!err.retriable);
    }

    #[tokio::test]
    async fn test_unauthorized_and_server_errors() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);

        let err = invoker.invoke("Hola", options()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthError);

        let err = invoker.invoke("Hola", options()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderHttpError { status_code: 503 });
        assert!(err.retriable);
    }

    #[tokio::test]
    async fn test_undecodable_envelope() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let err = invoker.invoke("Hola", options()).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert_eq!(err.raw_payload.as_deref(), Some("<html>proxy error</html>"));
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let err = invoker.invoke("Hola", options()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let mock_server = setup_mock_server().await;

        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("{}"))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&mock_server)
            .await;

        let invoker = create_test_invoker(&mock_server);
        let started = Instant::now();
        let err = invoker
            .invoke("Hola", InvokeOptions::new(Duration::from_millis(200)))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.retriable);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // nothing listens on the discard port
        let config = PipelineConfig {
            api_key: "mock_gemini_api_key".to_string(),
            base_url: "http://127.0.0.1:9/v1beta".to_string(),
            ..PipelineConfig::default()
        };
        let invoker = GeminiInvoker::new(&config).unwrap();

        let err = invoker.invoke("Hola", options()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderUnavailable);
    }
}
