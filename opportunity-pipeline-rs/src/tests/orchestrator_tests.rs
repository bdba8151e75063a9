//! Tests for the orchestrator
//!
//! The invoker is replaced by mockall mocks for call-count assertions and by
//! hand-written fakes where the test needs to observe cancellation.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::config::{IntentTimeouts, PipelineConfig};
    use crate::error::{ClassifiedError, ErrorKind, Result};
    use crate::invoker::{Completion, InvokeOptions, MockModelInvoker, ModelInvoker};
    use crate::models::{
        AnalyzeRequest, Category, GroundingSource, ImagePromptRequest, MarketingRequest,
        PipelineOutput, Request,
    };
    use crate::orchestrator::Orchestrator;

    const CHILE_COMPLETION: &str = r#"{"marketOverview":"x","currencySymbol":"$","currencyCode":"CLP","opportunities":[{"id":"1","title":"T","description":"D","initialInvestment":1000,"expectedROI":"10%","difficulty":"Baja","marketingStrategy":"M","referenceUrl":"http://x"}]}"#;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            api_key: "test_api_key".to_string(),
            result_count: 1,
            ..PipelineConfig::default()
        }
    }

    fn analyze_request(amount: f64) -> Request {
        Request::Analyze(AnalyzeRequest {
            investment_amount: amount,
            location: "Chile".to_string(),
            category: Category::General,
        })
    }

    fn mock_invoker() -> MockModelInvoker {
        let mut mock = MockModelInvoker::new();
        mock.expect_name().return_const("mock");
        mock
    }

    /// Sets a flag when dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Invoker whose call never resolves
    #[derive(Default)]
    struct HangingInvoker {
        started: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ModelInvoker for HangingInvoker {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn invoke(&self, _prompt: &str, _options: InvokeOptions) -> Result<Completion> {
            let _guard = DropFlag(Arc::clone(&self.dropped));
            self.started.store(true, Ordering::SeqCst);
            std::future::pending::<Result<Completion>>().await
        }
    }

    #[tokio::test]
    async fn test_zero_investment_never_invokes() {
        let mut mock = mock_invoker();
        mock.expect_invoke().times(0);

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let err = orchestrator.run(&analyze_request(0.0)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(!err.retriable);
    }

    #[tokio::test]
    async fn test_blank_inputs_never_invoke() {
        let mut mock = mock_invoker();
        mock.expect_invoke().times(0);
        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());

        let blank_location = Request::Analyze(AnalyzeRequest {
            investment_amount: 1000.0,
            location: "  ".to_string(),
            category: Category::Products,
        });
        let blank_title = Request::Marketing(MarketingRequest {
            title: String::new(),
            description: "d".to_string(),
            strategy: "s".to_string(),
        });

        for request in [blank_location, blank_title] {
            let err = orchestrator.run(&request).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidRequest);
        }
    }

    #[tokio::test]
    async fn test_chile_completion_normalizes_optional_arrays() {
        let mut mock = mock_invoker();
        mock.expect_invoke()
            .withf(|prompt, options| {
                prompt.contains("Chile") && prompt.contains("50000") && options.grounding
            })
            .times(1)
            .returning(|_, _| Ok(Completion::new(CHILE_COMPLETION)));

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let output = orchestrator.run(&analyze_request(50000.0)).await.unwrap();

        let result = output.into_analysis().expect("analysis output");
        assert_eq!(result.currency_code, "CLP");
        assert_eq!(result.opportunities.len(), 1);

        let opportunity = &result.opportunities[0];
        assert!(opportunity.trends.is_empty());
        assert!(opportunity.pros.is_empty());
        assert!(opportunity.cons.is_empty());
        assert!(opportunity.suppliers.is_empty());
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn test_fenced_completion_with_sources() {
        let mut mock = mock_invoker();
        mock.expect_invoke().times(1).returning(|_, _| {
            Ok(Completion::new(format!(
                "Aquí está el análisis:\n```json\n{}\n```\n",
                CHILE_COMPLETION
            ))
            .with_sources(vec![GroundingSource {
                title: "df.cl".to_string(),
                uri: "https://www.df.cl".to_string(),
            }]))
        });

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let result = orchestrator
            .analyze(AnalyzeRequest {
                investment_amount: 50000.0,
                location: "Chile".to_string(),
                category: Category::General,
            })
            .await
            .unwrap();

        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].title, "df.cl");
    }

    #[tokio::test]
    async fn test_invoker_error_passes_through_once() {
        let mut mock = mock_invoker();
        mock.expect_invoke()
            .times(1)
            .returning(|_, _| Err(ClassifiedError::rate_limited("quota").with_status(429)));

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let err = orchestrator.run(&analyze_request(1000.0)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.status_code, Some(429));
    }

    #[tokio::test]
    async fn test_schema_violation_surfaces() {
        let mut mock = mock_invoker();
        mock.expect_invoke().times(1).returning(|_, _| {
            Ok(Completion::new(CHILE_COMPLETION.replace("\"Baja\"", "\"Extrema\"")))
        });

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let err = orchestrator.run(&analyze_request(1000.0)).await.unwrap_err();

        assert_eq!(err.violated_field(), Some("opportunities[0].difficulty"));
        assert!(err.raw_payload.as_deref().unwrap().contains("Extrema"));
        assert!(!err.retriable);
    }

    #[tokio::test]
    async fn test_refusal_is_malformed() {
        let mut mock = mock_invoker();
        mock.expect_invoke()
            .times(1)
            .returning(|_, _| Ok(Completion::new("Lo siento, no puedo ayudar con eso.")));

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let err = orchestrator.run(&analyze_request(1000.0)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedResponse);
        assert_eq!(
            err.raw_payload.as_deref(),
            Some("Lo siento, no puedo ayudar con eso.")
        );
    }

    #[tokio::test]
    async fn test_marketing_copy() {
        let mut mock = mock_invoker();
        mock.expect_invoke()
            .withf(|prompt, options| prompt.contains("Título: Café") && !options.grounding)
            .times(1)
            .returning(|_, _| Ok(Completion::new("```\n¡Despierta con el mejor café! ☕\n```")));

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let output = orchestrator
            .run(&Request::Marketing(MarketingRequest {
                title: "Café".to_string(),
                description: "Tostaduría".to_string(),
                strategy: "TikTok".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(
            output,
            PipelineOutput::MarketingCopy("¡Despierta con el mejor café! ☕".to_string())
        );
    }

    #[tokio::test]
    async fn test_image_prompt_with_hosted_url() {
        let mut mock = mock_invoker();
        mock.expect_invoke()
            .times(1)
            .returning(|_, _| Ok(Completion::new("Cinematic coffee shop, 4k\n")));

        let config = PipelineConfig {
            image_url_template: Some("https://img.example/prompt/{prompt}".to_string()),
            ..test_config()
        };
        let orchestrator = Orchestrator::new(Arc::new(mock), &config);
        let output = orchestrator
            .run(&Request::ImagePrompt(ImagePromptRequest {
                source_text: "Guion".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(
            output,
            PipelineOutput::ImagePrompt {
                prompt: "Cinematic coffee shop, 4k".to_string(),
                image_url: Some(
                    "https://img.example/prompt/Cinematic%20coffee%20shop%2C%204k".to_string()
                ),
            }
        );
    }

    #[tokio::test]
    async fn test_deadline_drops_inflight_call() {
        let invoker = Arc::new(HangingInvoker::default());
        let started = Arc::clone(&invoker.started);
        let dropped = Arc::clone(&invoker.dropped);

        let config = PipelineConfig {
            timeouts: IntentTimeouts {
                analyze: Duration::from_millis(100),
                ..IntentTimeouts::default()
            },
            ..test_config()
        };
        let orchestrator = Orchestrator::new(invoker, &config);

        let begin = Instant::now();
        let err = orchestrator.run(&analyze_request(1000.0)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert!(started.load(Ordering::SeqCst));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_drops_inflight_call() {
        let invoker = Arc::new(HangingInvoker::default());
        let dropped = Arc::clone(&invoker.dropped);
        let orchestrator = Orchestrator::new(invoker, &test_config());

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = orchestrator
            .run_cancellable(&analyze_request(1000.0), &token)
            .await;

        assert!(outcome.is_none());
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_precancelled_token_skips_invocation() {
        let mut mock = mock_invoker();
        mock.expect_invoke().times(0);
        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());

        let token = CancellationToken::new();
        token.cancel();

        assert!(orchestrator
            .run_cancellable(&analyze_request(1000.0), &token)
            .await
            .is_none());
    }

    /// Invoker that cancels the caller's token right before answering
    struct CancelOnAnswer {
        token: CancellationToken,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelInvoker for CancelOnAnswer {
        fn name(&self) -> &'static str {
            "cancel-on-answer"
        }

        async fn invoke(&self, _prompt: &str, _options: InvokeOptions) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.token.cancel();
            Ok(Completion::new(CHILE_COMPLETION))
        }
    }

    #[tokio::test]
    async fn test_late_result_after_cancel_is_discarded() {
        let token = CancellationToken::new();
        let invoker = Arc::new(CancelOnAnswer {
            token: token.clone(),
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::new(Arc::clone(&invoker) as Arc<dyn ModelInvoker>, &test_config());

        let outcome = orchestrator
            .run_cancellable(&analyze_request(1000.0), &token)
            .await;

        assert!(outcome.is_none());
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let mut mock = mock_invoker();
        mock.expect_invoke()
            .times(4)
            .returning(|_, _| Ok(Completion::new(CHILE_COMPLETION)));

        let orchestrator = Orchestrator::new(Arc::new(mock), &test_config());
        let requests: Vec<Request> = (1..=4).map(|i| analyze_request(i as f64 * 1000.0)).collect();

        let results = futures::future::join_all(requests.iter().map(|r| orchestrator.run(r))).await;
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
