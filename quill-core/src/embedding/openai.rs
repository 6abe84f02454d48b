//! OpenAI-compatible embedding provider.

use super::models::dimension_for_model;
use super::{EmbeddingError, EmbeddingService, Result};
use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MODEL: &str = "text-embedding-ada-002";

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints.
///
/// Each call is exactly one `POST {base_url}/embeddings` with a bearer token.
/// Any non-2xx status or malformed body fails the whole call; there are no
/// retries and no partial results.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingService {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: EmbeddingInput<'a>,
    model: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiEmbeddingService {
    /// Builds a client from configuration. The model's dimension comes from the
    /// static model table, defaulting to 1536.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(EmbeddingError::Config(format!(
                "provider `{}` requires a base_url",
                config.provider
            )));
        }

        let model = if config.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            config.model.clone()
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| EmbeddingError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            api_key: config.api_key.clone(),
            dimension: dimension_for_model(&model),
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, input: EmbeddingInput<'_>, expected: usize) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            input,
            model: &self.model,
        };

        debug!(model = %self.model, count = expected, "Requesting embeddings");
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        decode_embeddings(status, body, expected)
    }
}

/// Turns a raw HTTP answer into exactly `expected` vectors, in input order.
fn decode_embeddings(status: StatusCode, body: String, expected: usize) -> Result<Vec<Vec<f32>>> {
    if !status.is_success() {
        return Err(EmbeddingError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let response: EmbeddingResponse = match serde_json::from_str(&body) {
        Ok(response) => response,
        Err(source) => return Err(EmbeddingError::Decode { source, body }),
    };

    let mut data = response.data;
    if data.is_empty() {
        return Err(EmbeddingError::NoEmbeddings);
    }
    if data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: data.len(),
        });
    }

    // Sort by index to maintain order
    data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        self.request(EmbeddingInput::Single(text), 1)
            .await?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::NoEmbeddings)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }
        if let Some(index) = texts.iter().position(|t| t.is_empty()) {
            return Err(EmbeddingError::BatchItem {
                index,
                source: Box::new(EmbeddingError::EmptyInput),
            });
        }

        self.request(EmbeddingInput::Batch(texts), texts.len()).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(model: &str) -> OpenAiEmbeddingService {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            api_key: "test-key".to_string(),
            model: model.to_string(),
            ..EmbeddingConfig::default()
        };
        OpenAiEmbeddingService::new(&config).unwrap()
    }

    #[test]
    fn test_model_defaults_and_dimension() {
        let default = service("");
        assert_eq!(default.model(), "text-embedding-ada-002");
        assert_eq!(default.dimension(), 1536);
        assert_eq!(service("text-embedding-3-large").dimension(), 3072);
        assert_eq!(service("custom-model").dimension(), 1536);
    }

    #[test]
    fn test_missing_base_url_is_config_error() {
        let config = EmbeddingConfig {
            provider: "azure".to_string(),
            base_url: String::new(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            OpenAiEmbeddingService::new(&config),
            Err(EmbeddingError::Config(_))
        ));
    }

    #[test]
    fn test_request_body_shapes() {
        let single = EmbeddingRequest {
            input: EmbeddingInput::Single("hello"),
            model: "m",
        };
        assert_eq!(
            serde_json::to_value(&single).unwrap(),
            serde_json::json!({"input": "hello", "model": "m"})
        );

        let texts = vec!["a".to_string(), "b".to_string()];
        let batch = EmbeddingRequest {
            input: EmbeddingInput::Batch(&texts),
            model: "m",
        };
        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            serde_json::json!({"input": ["a", "b"], "model": "m"})
        );
    }

    #[test]
    fn test_decode_success_restores_input_order() {
        let body = r#"{"data":[
            {"embedding":[0.0,1.0],"index":1},
            {"embedding":[1.0,0.0],"index":0}
        ]}"#;
        let vectors = decode_embeddings(StatusCode::OK, body.to_string(), 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_decode_without_index_field() {
        let body = r#"{"data":[{"embedding":[0.5,0.5,0.5]}]}"#;
        let vectors = decode_embeddings(StatusCode::OK, body.to_string(), 1).unwrap();
        assert_eq!(vectors[0].len(), 3);
    }

    #[test]
    fn test_decode_non_success_keeps_status_and_body() {
        let err = decode_embeddings(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"bad key"}"#.to_string(),
            1,
        )
        .unwrap_err();

        match err {
            EmbeddingError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = decode_embeddings(StatusCode::OK, "<html>oops</html>".to_string(), 1)
            .unwrap_err();
        match err {
            EmbeddingError::Decode { body, .. } => assert_eq!(body, "<html>oops</html>"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_count_mismatch() {
        let body = r#"{"data":[{"embedding":[1.0]}]}"#;
        let err = decode_embeddings(StatusCode::OK, body.to_string(), 3).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch { expected: 3, actual: 1 }
        ));
    }

    #[test]
    fn test_decode_empty_data() {
        let err = decode_embeddings(StatusCode::OK, r#"{"data":[]}"#.to_string(), 1)
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::NoEmbeddings));
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_text_before_any_request() {
        let service = service("text-embedding-3-small");
        assert!(matches!(
            service.embed("").await,
            Err(EmbeddingError::EmptyInput)
        ));
        assert!(matches!(
            service.embed_batch(&["ok".to_string(), String::new()]).await,
            Err(EmbeddingError::BatchItem { index: 1, .. })
        ));
    }
}
