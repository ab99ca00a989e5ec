use std::sync::Arc;

use crate::core::errors::ApiError;

use super::provider::LlmProvider;

/// Facade over the configured provider. Embedding requests are chunked to
/// the provider's batch limit; a failed batch fails the whole call, never
/// a partial result.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    embed_batch_size: usize,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LlmProvider>, embed_batch_size: usize) -> Self {
        Self {
            provider,
            embed_batch_size: embed_batch_size.max(1),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        self.provider.complete(prompt).await
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.embed_batch_size) {
            let vectors = self.provider.embed(batch).await?;
            all.extend(vectors);
        }

        Ok(all)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Internal("embedding gateway returned no vector".to_string()))
    }
}
