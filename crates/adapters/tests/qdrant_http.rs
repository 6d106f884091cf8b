// Qdrant REST adapter against a mock server.
#![allow(missing_docs)]

#[cfg(feature = "qdrant")]
mod qdrant {
    use code_ingest_adapters::vector_store::qdrant::{QdrantConfig, QdrantVectorStore};
    use code_ingest_domain::derive_record_id;
    use code_ingest_ports::{
        CollectionName, CollectionStatus, RecordPayload, SearchRequest, VectorBackend,
        VectorRecord,
    };
    use code_ingest_shared::{ErrorEnvelope, RequestContext, Result, SecretString};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> Result<QdrantVectorStore> {
        QdrantVectorStore::new(&QdrantConfig {
            url: server.uri().into(),
            api_key: Some(SecretString::new("qdrant-key")), // pragma: allowlist secret
            timeout_ms: 5_000,
        })
    }

    fn collection(name: &str) -> Result<CollectionName> {
        CollectionName::parse(name).map_err(ErrorEnvelope::from)
    }

    #[tokio::test]
    async fn create_collection_is_skipped_when_it_exists() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/rust_code"))
            .and(header("api-key", "qdrant-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "status": "green",
                    "points_count": 3,
                    "config": { "params": { "vectors": { "size": 4, "distance": "Cosine" } } }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/rust_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(&server)?;
        store
            .create_collection(&RequestContext::new_request(), collection("rust_code")?, 4, false)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn existing_collection_with_another_size_is_rejected() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/rust_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "status": "green",
                    "points_count": 3,
                    "config": { "params": { "vectors": { "size": 1536, "distance": "Cosine" } } }
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/rust_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
            .expect(0)
            .mount(&server)
            .await;

        let store = store(&server)?;
        let result = store
            .create_collection(&RequestContext::new_request(), collection("rust_code")?, 4, false)
            .await;
        let Err(error) = result else {
            return Err(ErrorEnvelope::expected(
                code_ingest_shared::ErrorCode::internal(),
                "mismatched collection was accepted",
            ));
        };
        assert_eq!(error.code.to_string(), "vector:dimension_mismatch");
        assert_eq!(error.metadata.get("expected").map(String::as_str), Some("1536"));
        assert_eq!(error.metadata.get("actual").map(String::as_str), Some("4"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_collection_is_created_with_cosine_distance() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/yaml_code"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": { "error": "Not found: Collection `yaml_code` doesn't exist!" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/yaml_code"))
            .and(body_partial_json(json!({
                "vectors": { "size": 4, "distance": "Cosine" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server)?;
        store
            .create_collection(&RequestContext::new_request(), collection("yaml_code")?, 4, false)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn upsert_waits_and_sends_ids_vectors_and_payloads() -> Result<()> {
        let server = MockServer::start().await;
        let id = derive_record_id("src/lib.rs", "lib", 1);
        Mock::given(method("PUT"))
            .and(path("/collections/rust_code/points"))
            .and(query_param("wait", "true"))
            .and(body_partial_json(json!({
                "points": [{ "id": id.as_str(), "vector": [1.0, 0.0], "payload": { "file_path": "src/lib.rs" } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "operation_id": 1, "status": "completed" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut payload = RecordPayload::new();
        payload.insert("file_path".to_owned(), json!("src/lib.rs"));
        let store = store(&server)?;
        store
            .upsert(
                &RequestContext::new_request(),
                collection("rust_code")?,
                vec![VectorRecord {
                    id,
                    vector: Arc::from(vec![1.0_f32, 0.0]),
                    payload,
                }],
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn search_and_info_decode_results() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/rust_code/points/search"))
            .and(body_partial_json(json!({ "limit": 2, "with_payload": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    { "id": "a", "score": 0.9, "payload": { "file_path": "src/a.rs" } },
                    { "id": 7, "score": 0.5 }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/rust_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "status": "yellow", "points_count": 12 }
            })))
            .mount(&server)
            .await;

        let store = store(&server)?;
        let ctx = RequestContext::new_request();
        let hits = store
            .search(
                &ctx,
                SearchRequest {
                    collection: collection("rust_code")?,
                    vector: Arc::from(vec![1.0_f32, 0.0]),
                    limit: 2,
                    score_threshold: None,
                },
            )
            .await?;
        let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "7"]);

        let info = store.collection_info(&ctx, collection("rust_code")?).await?;
        assert_eq!(info.count, 12);
        assert_eq!(info.status, CollectionStatus::Yellow);
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_retriable() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/rust_code/points"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "status": { "error": "service unavailable" }
            })))
            .mount(&server)
            .await;

        let store = store(&server)?;
        let error = store
            .upsert(
                &RequestContext::new_request(),
                collection("rust_code")?,
                vec![VectorRecord {
                    id: derive_record_id("a.rs", "a", 1),
                    vector: Arc::from(vec![1.0_f32]),
                    payload: RecordPayload::new(),
                }],
            )
            .await
            .err();
        assert!(error.is_some_and(|error| error.is_retriable()));
        Ok(())
    }
}
