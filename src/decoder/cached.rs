//! Caching decorator over a [`TokenDecoder`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::decoder::cache::TokenCache;
use crate::decoder::{DecodeError, DecodedToken, TokenDecoder};

/// Serves repeat tokens from a [`TokenCache`], delegating misses to `inner`.
pub struct CachedDecoder<D> {
    cache: TokenCache,
    inner: D,
}

impl<D: TokenDecoder> CachedDecoder<D> {
    pub fn new(cache: TokenCache, inner: D) -> Self {
        Self { cache, inner }
    }
}

#[async_trait]
impl<D: TokenDecoder> TokenDecoder for CachedDecoder<D> {
    async fn decode(&self, token: &str) -> Result<Arc<DecodedToken>, DecodeError> {
        if let Some(decoded) = self.cache.get(token).await {
            return Ok(decoded);
        }

        let decoded = self.inner.decode(token).await?;
        self.cache.insert(token.to_string(), Arc::clone(&decoded)).await;
        Ok(decoded)
    }
}
