//! Vectorizer contract and implementations.
//!
//! A vectorizer turns batches of strings into fixed-length float vectors.
//! It is an external, shared resource: model load may block on first use and
//! inference may be slow, so callers go through [`VectorizerHandle`], which
//! initializes the underlying vectorizer exactly once and remembers a failed
//! initialization as terminal.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{EmbeddingError, Result};
use crate::{Embedding, EMBEDDING_DIMENSION};

/// Trait for embedding vectorizers.
#[async_trait]
pub trait Vectorizer: Send + Sync {
    /// Get the name of this vectorizer.
    fn name(&self) -> &str;

    /// Get the embedding dimension this vectorizer produces.
    fn dimension(&self) -> usize;

    /// Encode a batch of texts into embeddings.
    ///
    /// Output order matches input order, one embedding per text.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Prepare the vectorizer for use.
    ///
    /// Called once by [`VectorizerHandle`] before the first encode;
    /// implementations may load models or probe their backend here.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }
}

/// Vectorizer backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Works against any server speaking that wire shape, e.g. a local
/// text-embeddings-inference instance serving a sentence-transformers model.
pub struct HttpVectorizer {
    /// API key, if the endpoint requires one.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to request.
    model: String,

    /// Expected embedding dimension.
    dimension: usize,
}

impl HttpVectorizer {
    /// Create a new HTTP vectorizer with default settings.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("EMBEDDINGS_API_KEY").ok(),
            base_url: "http://127.0.0.1:8080/v1".to_string(),
            client: reqwest::Client::new(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: EMBEDDING_DIMENSION,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the expected embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

impl Default for HttpVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vectorizer for HttpVectorizer {
    fn name(&self) -> &str {
        "http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Encoding batch of {} texts with model: {}",
            texts.len(),
            self.model
        );

        let body = EmbeddingsApiRequest {
            input: texts,
            model: &self.model,
        };

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error: {error_text}"
            )));
        }

        let result: EmbeddingsApiResponse = response.json().await?;

        if result.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // The wire format tags each embedding with its input index; restore
        // input order rather than trusting the array order.
        let mut embeddings: Vec<Option<Embedding>> = vec![None; texts.len()];
        for item in result.data {
            if item.embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: item.embedding.len(),
                });
            }
            let slot = embeddings.get_mut(item.index).ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!(
                    "embedding index {} out of range",
                    item.index
                ))
            })?;
            *slot = Some(item.embedding);
        }

        embeddings
            .into_iter()
            .map(|e| {
                e.ok_or_else(|| {
                    EmbeddingError::InvalidResponse("duplicate embedding index".to_string())
                })
            })
            .collect()
    }

    async fn ensure_ready(&self) -> Result<()> {
        // One short probe; on a cold backend this is where the model load
        // blocks, so the handle's init covers it exactly once.
        let probe = self.encode_batch(&["ready".to_string()]).await?;
        match probe.first() {
            Some(embedding) if embedding.len() == self.dimension => Ok(()),
            Some(embedding) => Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            }),
            None => Err(EmbeddingError::InvalidResponse(
                "empty probe response".to_string(),
            )),
        }
    }
}

/// OpenAI-compatible embeddings request.
#[derive(Debug, Serialize)]
struct EmbeddingsApiRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

/// OpenAI-compatible embeddings response.
#[derive(Debug, Deserialize)]
struct EmbeddingsApiResponse {
    data: Vec<EmbeddingsApiData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsApiData {
    embedding: Vec<f32>,
    index: usize,
}

type InitFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn Vectorizer>>> + Send>>;

/// Shared, lazily initialized vectorizer.
///
/// The first caller runs the init factory and the vectorizer's
/// [`Vectorizer::ensure_ready`]; concurrent first-callers are serialized so
/// initialization happens exactly once. A failed initialization is stored as
/// a terminal state and later callers fail fast instead of re-running an
/// expensive load.
pub struct VectorizerHandle {
    cell: OnceCell<std::result::Result<Arc<dyn Vectorizer>, String>>,
    init: Box<dyn Fn() -> InitFuture + Send + Sync>,
}

impl VectorizerHandle {
    /// Create a handle that initializes lazily via `factory`.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Vectorizer>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || Box::pin(factory())),
        }
    }

    /// Create a handle around an already constructed vectorizer.
    pub fn preinitialized(vectorizer: Arc<dyn Vectorizer>) -> Self {
        let for_init = vectorizer.clone();
        Self {
            cell: OnceCell::new_with(Some(Ok(vectorizer))),
            init: Box::new(move || {
                let vectorizer = for_init.clone();
                Box::pin(async move { Ok(vectorizer) })
            }),
        }
    }

    /// Get the vectorizer, initializing it on first use.
    pub async fn get(&self) -> Result<Arc<dyn Vectorizer>> {
        let slot = self
            .cell
            .get_or_init(|| async {
                match self.try_init().await {
                    Ok(vectorizer) => {
                        info!("Vectorizer '{}' initialized", vectorizer.name());
                        Ok(vectorizer)
                    }
                    Err(err) => {
                        warn!("Vectorizer initialization failed: {err}");
                        Err(err.to_string())
                    }
                }
            })
            .await;

        match slot {
            Ok(vectorizer) => Ok(vectorizer.clone()),
            Err(message) => Err(EmbeddingError::InitFailed(message.clone())),
        }
    }

    async fn try_init(&self) -> Result<Arc<dyn Vectorizer>> {
        let vectorizer = (self.init)().await?;
        vectorizer.ensure_ready().await?;
        Ok(vectorizer)
    }

    /// Whether the vectorizer has been successfully initialized.
    pub fn is_ready(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}
