//! Tests for error classification

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
    use serde_json::json;

    use crate::error::mapping::{
        classify_status, infer_from_message, is_retryable_status, retry_after_from_headers,
    };
    use crate::error::{classify, ClassifiedError, Confidence, ErrorKind, ProviderError};

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(429, "").kind, ErrorKind::RateLimited);
        assert_eq!(classify_status(401, "").kind, ErrorKind::AuthError);
        assert_eq!(classify_status(403, "").kind, ErrorKind::AuthError);
        assert_eq!(
            classify_status(500, "").kind,
            ErrorKind::ProviderHttpError { status_code: 500 }
        );
        assert_eq!(
            classify_status(404, "not found").kind,
            ErrorKind::ProviderHttpError { status_code: 404 }
        );

        let err = classify_status(429, "");
        assert_eq!(err.status_code, Some(429));
        assert!(err.retriable);
        assert_eq!(err.confidence, Confidence::Structured);
    }

    #[test]
    fn test_provider_error_codes() {
        let bad_key = json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{"@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID"}]
            }
        })
        .to_string();
        let err = classify_status(400, &bad_key);
        assert_eq!(err.kind, ErrorKind::AuthError);
        assert_eq!(err.message, "API key not valid. Please pass a valid API key.");
        assert!(!err.retriable);

        let exhausted = json!({
            "error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}
        })
        .to_string();
        assert_eq!(classify_status(429, &exhausted).kind, ErrorKind::RateLimited);

        let plain_bad_request = json!({
            "error": {"code": 400, "message": "Invalid JSON payload", "status": "INVALID_ARGUMENT"}
        })
        .to_string();
        assert_eq!(
            classify_status(400, &plain_bad_request).kind,
            ErrorKind::ProviderHttpError { status_code: 400 }
        );
    }

    #[test]
    fn test_retriability() {
        assert!(ClassifiedError::timeout("t").retriable);
        assert!(ClassifiedError::unavailable("u").retriable);
        assert!(ClassifiedError::malformed("m", "raw").retriable);
        assert!(ClassifiedError::provider_http(503, "x").retriable);
        assert!(!ClassifiedError::provider_http(400, "x").retriable);
        assert!(!ClassifiedError::schema("id", "x").retriable);
        assert!(!ClassifiedError::auth("x").retriable);
        assert!(!ClassifiedError::invalid_request("x").retriable);
        assert!(!ClassifiedError::unknown("x").retriable);

        assert!(is_retryable_status(502));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_message_fallback_is_inferred() {
        let err = infer_from_message("You exceeded your current quota");
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.confidence, Confidence::Inferred);
        assert!(!err.is_structured());

        assert_eq!(infer_from_message("operation timed out").kind, ErrorKind::Timeout);
        assert_eq!(infer_from_message("invalid api key").kind, ErrorKind::AuthError);
        assert_eq!(infer_from_message("something odd").kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_provider_errors() {
        let err = classify(ProviderError::Status {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(30)),
        });
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(Duration::from_secs(30)));

        let err = classify(ProviderError::DeadlineElapsed(Duration::from_millis(1500)));
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.message.contains("1500"));

        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = classify(ProviderError::Decode {
            body: "{oops".to_string(),
            source,
        });
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert_eq!(err.raw_payload.as_deref(), Some("{oops"));

        let err: ClassifiedError = ProviderError::Opaque("connection reset by peer".to_string()).into();
        assert_eq!(err.kind, ErrorKind::ProviderUnavailable);
        assert_eq!(err.confidence, Confidence::Inferred);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_from_headers(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(retry_after_from_headers(&headers), Some(Duration::from_secs(12)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_from_headers(&headers), None);
    }

    #[test]
    fn test_display_and_codes() {
        let err = ClassifiedError::schema("opportunities[0].difficulty", "bad literal");
        assert_eq!(
            err.to_string(),
            "schema_violation(opportunities[0].difficulty): bad literal"
        );
        assert_eq!(err.kind.code(), "schema_violation");
        assert_eq!(
            ErrorKind::ProviderHttpError { status_code: 502 }.to_string(),
            "provider_http_error(502)"
        );
    }

    #[test]
    fn test_user_messages_hide_raw_payload() {
        let err = ClassifiedError::malformed("not json", "SECRET MODEL OUTPUT");
        assert!(!err.user_message().contains("SECRET"));

        let err = ClassifiedError::rate_limited("quota").with_retry_after(Some(Duration::from_secs(20)));
        assert!(err.user_message().contains("20 segundos"));

        let err = ClassifiedError::schema("currencyCode", "missing");
        assert!(err.user_message().contains("currencyCode"));

        let err = ClassifiedError::invalid_request("Debes indicar una ubicación.");
        assert_eq!(err.user_message(), "Debes indicar una ubicación.");
    }
}
