// OpenAI-compatible embedding adapter against a mock server.
#![allow(missing_docs)]

#[cfg(feature = "openai")]
mod openai {
    use code_ingest_adapters::embedding::openai::{OpenAiEmbedding, OpenAiEmbeddingConfig};
    use code_ingest_ports::EmbeddingPort;
    use code_ingest_shared::{ErrorCode, RequestContext, Result, SecretString};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> OpenAiEmbeddingConfig {
        OpenAiEmbeddingConfig {
            api_key: SecretString::new("example"), // pragma: allowlist secret
            model: "text-embedding-3-small".into(),
            base_url: server.uri().into(),
            timeout_ms: 5_000,
            dimension: Some(2),
        }
    }

    #[tokio::test]
    async fn batch_is_sent_in_one_request_and_reordered() -> Result<()> {
        let server = MockServer::start().await;
        let response = ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "embedding": [0.3, 0.4], "index": 1 },
                { "embedding": [0.1, 0.2], "index": 0 }
            ]
        }));

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer example"))
            .and(body_json(json!({
                "model": "text-embedding-3-small",
                "input": ["fn a() {}", "fn b() {}"],
                "dimensions": 2
            })))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OpenAiEmbedding::new(&config(&server))?;
        let ctx = RequestContext::new_request();
        let vectors = adapter
            .embed_batch(&ctx, vec!["fn a() {}".into(), "fn b() {}".into()])
            .await?;

        let slices: Vec<&[f32]> = vectors.iter().map(|vector| vector.as_slice()).collect();
        assert_eq!(slices, vec![&[0.1_f32, 0.2][..], &[0.3_f32, 0.4][..]]);
        Ok(())
    }

    #[tokio::test]
    async fn rate_limit_response_is_retriable() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "slow down", "type": "rate_limit_exceeded" }
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiEmbedding::new(&config(&server))?;
        let error = adapter
            .embed_batch(&RequestContext::new_request(), vec!["x".into()])
            .await
            .err();

        assert!(error.as_ref().is_some_and(|error| error.is_retriable()));
        assert_eq!(error.map(|error| error.code), Some(ErrorCode::rate_limited()));
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_response_is_permanent() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "bad key" }
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiEmbedding::new(&config(&server))?;
        let error = adapter
            .embed_batch(&RequestContext::new_request(), vec!["x".into()])
            .await
            .err();

        assert!(error.as_ref().is_some_and(|error| !error.is_retriable()));
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::permission_denied())
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_does_not_call_the_provider() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let adapter = OpenAiEmbedding::new(&config(&server))?;
        let vectors = adapter
            .embed_batch(&RequestContext::new_request(), Vec::new())
            .await?;
        assert!(vectors.is_empty());
        Ok(())
    }
}
