mod openai;

pub use openai::{DEFAULT_EMBEDDING_MODEL, OpenAiConfig, OpenAiEmbedder};

use async_trait::async_trait;

use crate::error::StoreResult;

/// Turns query text into a vector.
///
/// Must use the same model that produced the indexed embeddings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> StoreResult<Vec<f32>>;
}
