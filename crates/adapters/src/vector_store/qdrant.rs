//! Qdrant vector store adapter over the REST API.

use code_ingest_ports::{
    BoxFuture, CollectionInfo, CollectionName, CollectionStatus, RecordId, RecordPayload,
    SearchHit, SearchRequest, VectorBackend, VectorRecord,
};
use code_ingest_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, SecretString,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Qdrant adapter configuration.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// REST endpoint, e.g. `http://localhost:6333`.
    pub url: Box<str>,
    /// Optional API key sent as the `api-key` header.
    pub api_key: Option<SecretString>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Qdrant vector store using cosine distance.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: Box<str>,
}

impl QdrantVectorStore {
    /// Create a new Qdrant adapter.
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let base_url = config.url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "qdrant url must be set",
            ));
        }
        if config.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "timeout must be greater than zero",
            ));
        }

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(api_key.expose()).map_err(|_| {
                ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "api key contains invalid header characters",
                )
            })?;
            value.set_sensitive(true);
            headers.insert("api-key", value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("vector", "qdrant_client_init_failed"),
                    format!("failed to build Qdrant client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn collection_url(&self, collection: &CollectionName, suffix: &str) -> String {
        format!(
            "{}/collections/{}{suffix}",
            self.base_url,
            collection.as_str()
        )
    }

    /// Send a request and return the status plus raw body, mapping transport errors.
    async fn send(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        ctx.ensure_not_cancelled(operation)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled_error(operation)),
            result = request.send() => result.map_err(|error| map_reqwest_error(&error))?,
        };
        let status = response.status();
        let payload = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled_error(operation)),
            result = response.bytes() => result.map_err(|error| map_reqwest_error(&error))?,
        };
        Ok((status, payload.to_vec()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<T> {
        let (status, payload) = self.send(ctx, operation, method, url, body).await?;
        if !status.is_success() {
            return Err(map_qdrant_http_error(status, &payload).with_metadata("operation", operation));
        }
        decode_result(&payload, operation)
    }

    async fn existing_collection(
        &self,
        ctx: &RequestContext,
        collection: &CollectionName,
    ) -> Result<Option<QdrantCollectionInfo>> {
        const OPERATION: &str = "vector_qdrant.collection_exists";
        let (status, payload) = self
            .send(
                ctx,
                OPERATION,
                Method::GET,
                self.collection_url(collection, ""),
                None,
            )
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(map_qdrant_http_error(status, &payload).with_metadata("operation", OPERATION));
        }
        decode_result(&payload, OPERATION).map(Some)
    }
}

impl VectorBackend for QdrantVectorStore {
    fn provider_id(&self) -> &str {
        "qdrant"
    }

    fn create_collection(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
        dimension: u32,
        recreate: bool,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            if let Some(existing) = self.existing_collection(&ctx, &collection).await? {
                if !recreate {
                    return match existing.vector_size() {
                        Some(size) if size != u64::from(dimension) => {
                            Err(dimension_mismatch(&collection, size, dimension))
                        },
                        _ => Ok(()),
                    };
                }
                let _: Value = self
                    .call(
                        &ctx,
                        "vector_qdrant.drop_collection",
                        Method::DELETE,
                        self.collection_url(&collection, ""),
                        None,
                    )
                    .await?;
            }

            let body = serde_json::json!({
                "vectors": { "size": dimension, "distance": "Cosine" }
            });
            let _: Value = self
                .call(
                    &ctx,
                    "vector_qdrant.create_collection",
                    Method::PUT,
                    self.collection_url(&collection, ""),
                    Some(body),
                )
                .await?;
            tracing::info!(collection = %collection, dimension, "qdrant collection created");
            Ok(())
        })
    }

    fn upsert(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
        records: Vec<VectorRecord>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            if records.is_empty() {
                return Ok(());
            }
            let points: Vec<QdrantPoint<'_>> = records
                .iter()
                .map(|record| QdrantPoint {
                    id: record.id.as_str(),
                    vector: &record.vector,
                    payload: &record.payload,
                })
                .collect();
            let body = serde_json::to_value(QdrantUpsert { points }).map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    format!("failed to encode points: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;
            let _: Value = self
                .call(
                    &ctx,
                    "vector_qdrant.upsert",
                    Method::PUT,
                    self.collection_url(&collection, "/points?wait=true"),
                    Some(body),
                )
                .await?;
            Ok(())
        })
    }

    fn search(
        &self,
        ctx: &RequestContext,
        request: SearchRequest,
    ) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let mut body = serde_json::json!({
                "vector": request.vector.as_ref(),
                "limit": request.limit.max(1),
                "with_payload": true,
            });
            if let (Some(threshold), Some(object)) = (request.score_threshold, body.as_object_mut()) {
                object.insert("score_threshold".to_owned(), threshold.into());
            }
            let points: Vec<QdrantScoredPoint> = self
                .call(
                    &ctx,
                    "vector_qdrant.search",
                    Method::POST,
                    self.collection_url(&request.collection, "/points/search"),
                    Some(body),
                )
                .await?;
            Ok(points
                .into_iter()
                .map(|point| SearchHit {
                    id: point_id(point.id),
                    score: point.score,
                    payload: point.payload.unwrap_or_default(),
                })
                .collect())
        })
    }

    fn collection_info(
        &self,
        ctx: &RequestContext,
        collection: CollectionName,
    ) -> BoxFuture<'_, Result<CollectionInfo>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let info: QdrantCollectionInfo = self
                .call(
                    &ctx,
                    "vector_qdrant.collection_info",
                    Method::GET,
                    self.collection_url(&collection, ""),
                    None,
                )
                .await?;
            Ok(CollectionInfo {
                name: collection,
                count: info.points_count.unwrap_or_default(),
                status: CollectionStatus::parse(&info.status),
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Serialize)]
struct QdrantUpsert<'a> {
    points: Vec<QdrantPoint<'a>>,
}

#[derive(Debug, Serialize)]
struct QdrantPoint<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: &'a RecordPayload,
}

#[derive(Debug, Deserialize)]
struct QdrantScoredPoint {
    id: Value,
    score: f32,
    payload: Option<RecordPayload>,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionInfo {
    status: String,
    points_count: Option<u64>,
    #[serde(default)]
    config: Option<QdrantCollectionConfig>,
}

impl QdrantCollectionInfo {
    /// Size of the unnamed vector; `None` for named-vector collections.
    fn vector_size(&self) -> Option<u64> {
        self.config.as_ref()?.params.vectors.get("size")?.as_u64()
    }
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionConfig {
    params: QdrantCollectionParams,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionParams {
    vectors: Value,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorResponse {
    status: QdrantErrorStatus,
}

#[derive(Debug, Deserialize)]
struct QdrantErrorStatus {
    error: String,
}

fn point_id(id: Value) -> RecordId {
    match id {
        Value::String(id) => RecordId::from(id),
        other => RecordId::from(other.to_string()),
    }
}

fn decode_result<T: DeserializeOwned>(payload: &[u8], operation: &'static str) -> Result<T> {
    let envelope: QdrantResponse<T> = serde_json::from_slice(payload).map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::new("vector", "qdrant_invalid_response"),
            format!("failed to decode Qdrant response: {error}"),
            ErrorClass::NonRetriable,
        )
        .with_metadata("operation", operation)
    })?;
    Ok(envelope.result)
}

fn dimension_mismatch(collection: &CollectionName, existing: u64, requested: u32) -> ErrorEnvelope {
    ErrorEnvelope::expected(
        ErrorCode::new("vector", "dimension_mismatch"),
        "vector dimension does not match the collection",
    )
    .with_metadata("collection", collection.as_str())
    .with_metadata("expected", existing.to_string())
    .with_metadata("actual", requested.to_string())
}

fn cancelled_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}

fn map_reqwest_error(error: &reqwest::Error) -> ErrorEnvelope {
    if error.is_timeout() {
        return ErrorEnvelope::unexpected(
            ErrorCode::timeout(),
            "Qdrant request timed out",
            ErrorClass::Retriable,
        );
    }
    if error.is_connect() {
        return ErrorEnvelope::unexpected(
            ErrorCode::io(),
            format!("Qdrant connection failed: {error}"),
            ErrorClass::Retriable,
        );
    }
    ErrorEnvelope::unexpected(
        ErrorCode::new("vector", "qdrant_request_failed"),
        format!("Qdrant request failed: {error}"),
        ErrorClass::NonRetriable,
    )
}

fn map_qdrant_http_error(status: StatusCode, payload: &[u8]) -> ErrorEnvelope {
    let message = serde_json::from_slice::<QdrantErrorResponse>(payload).map_or_else(
        |_| format!("Qdrant request failed with status {status}"),
        |parsed| parsed.status.error,
    );
    let envelope = match status.as_u16() {
        400 | 422 => ErrorEnvelope::expected(ErrorCode::invalid_input(), message),
        401 | 403 => ErrorEnvelope::expected(ErrorCode::permission_denied(), message),
        404 => ErrorEnvelope::expected(ErrorCode::not_found(), message),
        408 => ErrorEnvelope::unexpected(ErrorCode::timeout(), message, ErrorClass::Retriable),
        429 => ErrorEnvelope::unexpected(ErrorCode::rate_limited(), message, ErrorClass::Retriable),
        _ if status.is_server_error() => ErrorEnvelope::unexpected(
            ErrorCode::dependency_unavailable(),
            message,
            ErrorClass::Retriable,
        ),
        _ => ErrorEnvelope::unexpected(
            ErrorCode::new("vector", "qdrant_http_error"),
            message,
            ErrorClass::NonRetriable,
        ),
    };
    envelope.with_metadata("status", status.as_u16().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retriable_and_carry_the_message() {
        let envelope = map_qdrant_http_error(
            StatusCode::SERVICE_UNAVAILABLE,
            br#"{"status":{"error":"overloaded"},"time":0.1}"#,
        );
        assert!(envelope.is_retriable());
        assert_eq!(envelope.message, "overloaded");
        assert_eq!(
            envelope.metadata.get("status").map(String::as_str),
            Some("503")
        );
    }

    #[test]
    fn numeric_point_ids_are_stringified() {
        assert_eq!(point_id(Value::from(7)).as_str(), "7");
        assert_eq!(point_id(Value::from("a-b")).as_str(), "a-b");
    }

    #[test]
    fn empty_url_is_rejected() {
        let config = QdrantConfig {
            url: " ".into(),
            api_key: None,
            timeout_ms: 1_000,
        };
        assert!(QdrantVectorStore::new(&config).is_err());
    }
}
