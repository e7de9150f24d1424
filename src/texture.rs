//! Texture Loader (spec §4.9, C9).
//!
//! Fetches an image URL, decodes it, and caches the result by URL — first
//! resolved texture wins, repeat requests return the same handle (spec
//! §4.9, §5 "textures are reference-counted implicitly by retention in the
//! cache"). `reqwest` + `image` are the pack's common choice for async
//! HTTP + decode (`decentraland-bevy-explorer`); this loader is a client
//! of the image-proxy contract (spec §6.3), never a server.

use crate::error::TextureError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Decoded pixel data plus its dimensions — renderer-agnostic, since the
/// core ships no GPU backend (spec §1). A real renderer adapter turns this
/// into an actual GPU texture.
#[derive(Debug, Clone)]
pub struct TextureHandle {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub rgba8: Arc<[u8]>,
}

/// URL-keyed cache with indefinite retention (spec §9 "a future bounded
/// LRU can slot in without changing C9's contract" — so this stays a
/// plain map, not a capacity-bounded structure).
#[derive(Clone, Default)]
pub struct TextureLoader {
    cache: Arc<RwLock<HashMap<String, Arc<TextureHandle>>>>,
    client: reqwest::Client,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self { cache: Arc::new(RwLock::new(HashMap::new())), client: reqwest::Client::new() }
    }

    /// Returns the cached handle if present without touching the network.
    pub fn get_cached(&self, url: &str) -> Option<Arc<TextureHandle>> {
        self.cache.read().unwrap().get(url).cloned()
    }

    /// Fetches and decodes `url`, caching the result. A second concurrent
    /// or subsequent call for the same URL returns the same `Arc` handle
    /// (spec §4.9 "first resolved texture wins").
    pub async fn load(&self, url: &str) -> Result<Arc<TextureHandle>, TextureError> {
        if let Some(cached) = self.get_cached(url) {
            return Ok(cached);
        }

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| TextureError::Fetch { url: url.to_string(), source })?
            .bytes()
            .await
            .map_err(|source| TextureError::Fetch { url: url.to_string(), source })?;

        let decoded = image::load_from_memory(&bytes)
            .map_err(|source| TextureError::Decode { url: url.to_string(), source })?
            .to_rgba8();

        let (width, height) = decoded.dimensions();
        let handle = Arc::new(TextureHandle {
            url: url.to_string(),
            width,
            height,
            rgba8: Arc::from(decoded.into_raw().into_boxed_slice()),
        });

        // Another in-flight load may have just won the race; prefer
        // whichever is already cached so every caller converges on one
        // handle instance.
        let mut cache = self.cache.write().unwrap();
        let winner = cache.entry(url.to_string()).or_insert_with(|| handle.clone());
        Ok(winner.clone())
    }

    /// Logged once per URL by the caller on first failure (spec §7 class
    /// 4); the caller substitutes a placeholder texture, this loader does
    /// not invent one.
    pub fn evict(&self, url: &str) {
        self.cache.write().unwrap().remove(url);
    }
}
