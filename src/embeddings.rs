//! Embedding providers — map turn content and search queries to vectors.

use std::collections::{HashMap, VecDeque};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::openai::OpenAiClient;

/// Converts text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Vector used in place of an embedding that could not be computed.
pub fn zero_vector(dimensions: usize) -> Vec<f32> {
    vec![0.0; dimensions]
}

// ── OpenAI ───────────────────────────────────────────────────────────

pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient, model: &str, dims: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            dims,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .client
            .embeddings(&self.model, &[text])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("empty embedding result"))?;
        if vector.len() != self.dims {
            return Err(anyhow!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.dims
            ));
        }
        Ok(vector)
    }
}

// ── Cache ────────────────────────────────────────────────────────────

/// Bounded cache in front of another embedder, keyed by content hash.
///
/// Persona-change notes and repeated `/search` queries embed the same text
/// over and over; this keeps them to one provider call each. Entries are
/// evicted oldest-first once `capacity` is reached.
pub struct CachedEmbedder<E> {
    inner: E,
    capacity: usize,
    entries: Mutex<CacheEntries>,
}

#[derive(Default)]
struct CacheEntries {
    vectors: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(CacheEntries::default()),
        }
    }

    /// SHA-256 of the text, hex encoded.
    fn content_hash(text: &str) -> String {
        Sha256::digest(text.as_bytes())
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().vectors.len()
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = Self::content_hash(text);
        let cached = self.entries.lock().vectors.get(&hash).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        // Failures are not cached, the next call retries the provider.
        let vector = self.inner.embed(text).await?;

        let mut entries = self.entries.lock();
        if entries.vectors.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.vectors.remove(&oldest);
            }
        }
        if entries.vectors.insert(hash.clone(), vector.clone()).is_none() {
            entries.order.push_back(hash);
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEmbedder {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("provider down"));
            }
            let len = text.len() as f32;
            Ok(vec![len, 1.0])
        }
    }

    #[test]
    fn zero_vector_has_requested_length() {
        let v = zero_vector(1536);
        assert_eq!(v.len(), 1536);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn cache_serves_repeated_text_without_calling_provider() {
        let cached = CachedEmbedder::new(CountingEmbedder::new(false), 8);
        let first = cached.embed("Persona changed to: pirate").await.unwrap();
        let second = cached.embed("Persona changed to: pirate").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn cache_evicts_oldest_entry_at_capacity() {
        let cached = CachedEmbedder::new(CountingEmbedder::new(false), 2);
        cached.embed("a").await.unwrap();
        cached.embed("bb").await.unwrap();
        cached.embed("ccc").await.unwrap();
        assert_eq!(cached.len(), 2);

        // "a" was evicted, so it costs another provider call.
        cached.embed("a").await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cache_does_not_remember_failures() {
        let cached = CachedEmbedder::new(CountingEmbedder::new(true), 4);
        assert!(cached.embed("hello").await.is_err());
        assert!(cached.embed("hello").await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.len(), 0);
    }
}
