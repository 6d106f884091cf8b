//! OpenAI-compatible embedding adapter.

use code_ingest_config::EmbeddingConfig;
use code_ingest_ports::{BoxFuture, EmbeddingPort, EmbeddingProviderInfo, EmbeddingVector};
use code_ingest_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result, SecretString,
};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER_ID: &str = "openai";

/// OpenAI embedding adapter configuration.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    /// API key used for bearer authentication.
    pub api_key: SecretString,
    /// Embedding model name.
    pub model: Box<str>,
    /// Base URL; `/embeddings` is appended.
    pub base_url: Box<str>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Output dimension; sent as `dimensions` when set.
    pub dimension: Option<u32>,
}

impl OpenAiEmbeddingConfig {
    /// Build from the validated embedding config plus an API key.
    #[must_use]
    pub fn from_embedding_config(api_key: SecretString, config: &EmbeddingConfig) -> Self {
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            timeout_ms: config.timeout_ms,
            dimension: Some(config.dimension),
        }
    }
}

/// OpenAI embedding adapter implementation.
///
/// Makes exactly one HTTP call per batch. The HTTP client timeout is a
/// backstop; callers apply their own per-attempt deadline.
pub struct OpenAiEmbedding {
    provider: EmbeddingProviderInfo,
    client: reqwest::Client,
    endpoint: Box<str>,
    model: Box<str>,
    dimension: Option<u32>,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding adapter.
    pub fn new(config: &OpenAiEmbeddingConfig) -> Result<Self> {
        let api_key = normalize_required("api key", config.api_key.expose())?;
        let model = normalize_required("model", &config.model)?;
        let base_url = normalize_required("base url", &config.base_url)?;
        let base_url = base_url.trim_end_matches('/');
        if config.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "timeout must be greater than zero",
            ));
        }

        let mut headers = HeaderMap::new();
        let mut auth_header =
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
                ErrorEnvelope::expected(
                    ErrorCode::invalid_input(),
                    "api key contains invalid header characters",
                )
            })?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("embedding", "openai_client_init_failed"),
                    format!("failed to build OpenAI client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;

        let provider = EmbeddingProviderInfo {
            id: PROVIDER_ID.into(),
            model: model.clone(),
            dimension: config.dimension.unwrap_or_default(),
        };
        let endpoint = format!("{base_url}/embeddings").into_boxed_str();

        Ok(Self {
            provider,
            client,
            endpoint,
            model,
            dimension: config.dimension,
        })
    }

    async fn send_request(
        &self,
        ctx: &RequestContext,
        request: OpenAiEmbeddingRequest,
    ) -> Result<OpenAiEmbeddingResponse> {
        const OPERATION: &str = "openai_embedding.embed_batch";
        ctx.ensure_not_cancelled(OPERATION)?;

        let response = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled_error(OPERATION)),
            result = self.client.post(self.endpoint.as_ref()).json(&request).send() => {
                result.map_err(|error| map_reqwest_error(&error))?
            }
        };

        let status = response.status();
        let payload = tokio::select! {
            () = ctx.cancelled() => return Err(cancelled_error(OPERATION)),
            result = response.bytes() => result.map_err(|error| map_reqwest_error(&error))?,
        };

        if !status.is_success() {
            return Err(map_openai_http_error(status, &payload));
        }

        serde_json::from_slice(&payload).map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::new("embedding", "openai_invalid_response"),
                format!("failed to decode OpenAI response: {error}"),
                ErrorClass::NonRetriable,
            )
        })
    }
}

impl EmbeddingPort for OpenAiEmbedding {
    fn provider(&self) -> &EmbeddingProviderInfo {
        &self.provider
    }

    fn embed_batch(
        &self,
        ctx: &RequestContext,
        texts: Vec<Box<str>>,
    ) -> BoxFuture<'_, Result<Vec<EmbeddingVector>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let request = OpenAiEmbeddingRequest {
                model: self.model.clone(),
                input: texts.into_iter().map(sanitize_text).collect(),
                dimensions: self.dimension,
            };
            let response = self.send_request(&ctx, request).await?;
            order_by_index(response)
        })
    }
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    model: Box<str>,
    input: Vec<Box<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingDatum {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}

fn normalize_required(label: &str, value: &str) -> Result<Box<str>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!("{label} must be set"),
        ));
    }
    Ok(trimmed.to_owned().into_boxed_str())
}

fn sanitize_text(text: Box<str>) -> Box<str> {
    if text.is_empty() { " ".into() } else { text }
}

fn cancelled_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}

fn map_reqwest_error(error: &reqwest::Error) -> ErrorEnvelope {
    if error.is_timeout() {
        return ErrorEnvelope::unexpected(
            ErrorCode::timeout(),
            "OpenAI request timed out",
            ErrorClass::Retriable,
        );
    }
    if error.is_connect() {
        return ErrorEnvelope::unexpected(
            ErrorCode::io(),
            format!("OpenAI connection failed: {error}"),
            ErrorClass::Retriable,
        );
    }
    ErrorEnvelope::unexpected(
        ErrorCode::new("embedding", "openai_request_failed"),
        format!("OpenAI request failed: {error}"),
        ErrorClass::NonRetriable,
    )
}

fn map_openai_http_error(status: StatusCode, payload: &[u8]) -> ErrorEnvelope {
    let mut envelope = if let Ok(parsed) = serde_json::from_slice::<OpenAiErrorResponse>(payload) {
        let message = parsed.error.message;
        let mut envelope = match status.as_u16() {
            400 | 404 | 422 => ErrorEnvelope::expected(ErrorCode::invalid_input(), message),
            401 | 403 => ErrorEnvelope::expected(ErrorCode::permission_denied(), message),
            408 => ErrorEnvelope::unexpected(ErrorCode::timeout(), message, ErrorClass::Retriable),
            429 => {
                ErrorEnvelope::unexpected(ErrorCode::rate_limited(), message, ErrorClass::Retriable)
            },
            _ if status.is_server_error() => ErrorEnvelope::unexpected(
                ErrorCode::dependency_unavailable(),
                message,
                ErrorClass::Retriable,
            ),
            _ => ErrorEnvelope::unexpected(
                ErrorCode::new("embedding", "openai_http_error"),
                message,
                ErrorClass::NonRetriable,
            ),
        };

        if let Some(error_type) = parsed.error.error_type.as_deref() {
            envelope = envelope.with_metadata("error_type", error_type.to_string());
        }
        if let Some(error_code) = parsed.error.code.as_deref() {
            envelope = envelope.with_metadata("error_code", error_code.to_string());
        }
        envelope
    } else {
        let class = if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            ErrorClass::Retriable
        } else {
            ErrorClass::NonRetriable
        };
        ErrorEnvelope::unexpected(
            ErrorCode::new("embedding", "openai_http_error"),
            "OpenAI request failed with non-JSON error",
            class,
        )
    };

    envelope = envelope.with_metadata("status", status.as_u16().to_string());
    envelope
}

/// Restore input order from the response `index` field.
///
/// Count and dimension checks belong to the caller.
fn order_by_index(response: OpenAiEmbeddingResponse) -> Result<Vec<EmbeddingVector>> {
    let mut data = response.data;
    data.sort_by_key(|datum| datum.index);
    let duplicated = data
        .windows(2)
        .any(|pair| matches!(pair, [first, second] if first.index == second.index));
    if duplicated {
        return Err(ErrorEnvelope::unexpected(
            ErrorCode::new("embedding", "openai_invalid_response"),
            "embedding response index duplicated",
            ErrorClass::NonRetriable,
        ));
    }
    Ok(data
        .into_iter()
        .map(|datum| EmbeddingVector::from_vec(datum.embedding))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_batch_with_dimensions() -> serde_json::Result<()> {
        let request = OpenAiEmbeddingRequest {
            model: "text-embedding-3-small".into(),
            input: vec!["a".into(), sanitize_text("".into())],
            dimensions: Some(2),
        };
        let value = serde_json::to_value(&request)?;
        assert_eq!(
            value,
            json!({
                "model": "text-embedding-3-small",
                "input": ["a", " "],
                "dimensions": 2
            })
        );
        Ok(())
    }

    #[test]
    fn response_is_reordered_by_index() -> Result<()> {
        let response = OpenAiEmbeddingResponse {
            data: vec![
                OpenAiEmbeddingDatum {
                    embedding: vec![2.0],
                    index: 1,
                },
                OpenAiEmbeddingDatum {
                    embedding: vec![1.0],
                    index: 0,
                },
            ],
        };
        let vectors = order_by_index(response)?;
        let firsts: Vec<f32> = vectors
            .iter()
            .filter_map(|vector| vector.as_slice().first().copied())
            .collect();
        assert_eq!(firsts, vec![1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn rate_limited_is_retriable() -> serde_json::Result<()> {
        let payload = serde_json::to_vec(&json!({
            "error": {
                "message": "rate limited",
                "type": "requests"
            }
        }))?;
        let envelope = map_openai_http_error(StatusCode::TOO_MANY_REQUESTS, &payload);
        assert_eq!(envelope.class, ErrorClass::Retriable);
        assert_eq!(envelope.code, ErrorCode::rate_limited());
        assert_eq!(
            envelope.metadata.get("error_type").map(String::as_str),
            Some("requests")
        );
        Ok(())
    }

    #[test]
    fn unauthorized_is_not_retriable() {
        let envelope = map_openai_http_error(
            StatusCode::UNAUTHORIZED,
            br#"{"error":{"message":"bad key"}}"#,
        );
        assert_eq!(envelope.class, ErrorClass::NonRetriable);
        assert_eq!(envelope.code, ErrorCode::permission_denied());
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let config = OpenAiEmbeddingConfig {
            api_key: SecretString::new(" "),
            model: "text-embedding-3-small".into(),
            base_url: "http://localhost".into(),
            timeout_ms: 1_000,
            dimension: None,
        };
        assert!(OpenAiEmbedding::new(&config).is_err());
    }
}
