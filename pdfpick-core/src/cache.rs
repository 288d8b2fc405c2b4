//! Bounded caches of rendered page bitmaps and thumbnails.
//!
//! Both maps sit behind one lock that is only held for lookups, inserts and
//! evictions; rasterization always happens with the lock released.

use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Context, Result};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{DocumentBackend, RenderImage, RenderRequest};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct CacheKey {
    pub page_index: usize,
    pub zoom_centi: u32,
}

impl CacheKey {
    pub fn new(page_index: usize, zoom: f32) -> Self {
        Self {
            page_index,
            zoom_centi: quantize_zoom(zoom),
        }
    }

    /// The zoom the cached bitmap was actually rendered at.
    pub fn zoom(&self) -> f32 {
        self.zoom_centi as f32 / 100.0
    }
}

/// Rounds zoom to hundredths so float jitter maps onto one entry.
pub fn quantize_zoom(zoom: f32) -> u32 {
    let scaled = (zoom * 100.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > u32::MAX as f32 {
        u32::MAX
    } else {
        scaled as u32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub pages: usize,
    pub thumbnails: usize,
}

struct CacheState {
    generation: u64,
    pages: LruCache<CacheKey, Arc<RenderImage>>,
    thumbnails: LruCache<usize, Arc<RenderImage>>,
    hits: u64,
    misses: u64,
}

pub struct RenderCache {
    base_resolution: f32,
    thumbnail_width: u32,
    state: Mutex<CacheState>,
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl RenderCache {
    pub fn new(
        page_capacity: usize,
        thumbnail_capacity: usize,
        base_resolution: f32,
        thumbnail_width: u32,
    ) -> Self {
        Self {
            base_resolution,
            thumbnail_width,
            state: Mutex::new(CacheState {
                generation: 0,
                pages: LruCache::new(non_zero(page_capacity)),
                thumbnails: LruCache::new(non_zero(thumbnail_capacity)),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn from_config(config: &crate::EngineConfig) -> Self {
        Self::new(
            config.page_cache_capacity,
            config.thumbnail_cache_capacity,
            config.base_resolution,
            config.thumbnail_width,
        )
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Drops every entry and starts a new generation. Renders that began
    /// before the reset are never stored.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pages.clear();
        state.thumbnails.clear();
        state.generation += 1;
        debug!(generation = state.generation, "render cache reset");
    }

    /// Returns the page bitmap at `zoom`, rendering through the adapter on a miss.
    pub fn get(
        &self,
        backend: &dyn DocumentBackend,
        page_index: usize,
        zoom: f32,
    ) -> Result<Arc<RenderImage>> {
        let generation = self.generation();
        self.get_for_generation(backend, page_index, zoom, generation)
    }

    /// Like [`Self::get`], for a request issued under `generation`. The cache
    /// is neither read nor filled once a reset has moved past it, so a render
    /// queued for a closed document never lands under the new one.
    pub fn get_for_generation(
        &self,
        backend: &dyn DocumentBackend,
        page_index: usize,
        zoom: f32,
        generation: u64,
    ) -> Result<Arc<RenderImage>> {
        let key = CacheKey::new(page_index, zoom);
        {
            let mut state = self.state.lock();
            if state.generation == generation {
                if let Some(image) = state.pages.get(&key).cloned() {
                    state.hits += 1;
                    trace!(?key, "page cache hit");
                    return Ok(image);
                }
            }
            state.misses += 1;
        }

        let request = RenderRequest {
            page_index,
            scale: key.zoom() * self.base_resolution,
        };
        let image = Arc::new(
            backend
                .render_page(request)
                .with_context(|| format!("failed to render page {}", page_index))?,
        );

        let mut state = self.state.lock();
        if state.generation == generation {
            state.pages.put(key, Arc::clone(&image));
        } else {
            debug!(?key, generation, "discarding render from a previous document");
        }
        Ok(image)
    }

    /// Cached bitmap for exactly `(page_index, zoom)`, if any. Counts as a
    /// use: the entry becomes the most recently used one.
    pub fn get_cached(&self, page_index: usize, zoom: f32) -> Option<Arc<RenderImage>> {
        let key = CacheKey::new(page_index, zoom);
        let mut state = self.state.lock();
        let image = state.pages.get(&key).cloned()?;
        state.hits += 1;
        Some(image)
    }

    /// Returns the page thumbnail, rendered at `thumbnail_width` pixels wide.
    pub fn thumbnail(
        &self,
        backend: &dyn DocumentBackend,
        page_index: usize,
    ) -> Result<Arc<RenderImage>> {
        let generation = {
            let mut state = self.state.lock();
            if let Some(image) = state.thumbnails.get(&page_index).cloned() {
                state.hits += 1;
                return Ok(image);
            }
            state.misses += 1;
            state.generation
        };

        let geometry = backend
            .page_geometry(page_index)
            .with_context(|| format!("failed to measure page {}", page_index))?;
        let (width, _) = geometry.displayed_size();
        let scale = if width > 0.0 {
            self.thumbnail_width as f32 / width
        } else {
            1.0
        };
        let image = Arc::new(
            backend
                .render_page(RenderRequest { page_index, scale })
                .with_context(|| format!("failed to render thumbnail {}", page_index))?,
        );

        let mut state = self.state.lock();
        if state.generation == generation {
            state.thumbnails.put(page_index, Arc::clone(&image));
        }
        Ok(image)
    }

    /// Best bitmap already on hand for `(page_index, zoom)`, without rendering
    /// and without touching LRU order: the exact entry, else the closest zoom
    /// of the same page, else the page thumbnail.
    pub fn peek_best(&self, page_index: usize, zoom: f32) -> Option<Arc<RenderImage>> {
        let key = CacheKey::new(page_index, zoom);
        let state = self.state.lock();
        if let Some(image) = state.pages.peek(&key) {
            return Some(Arc::clone(image));
        }
        let closest = state
            .pages
            .iter()
            .filter(|(k, _)| k.page_index == page_index)
            .min_by_key(|(k, _)| k.zoom_centi.abs_diff(key.zoom_centi))
            .map(|(_, image)| Arc::clone(image));
        closest.or_else(|| state.thumbnails.peek(&page_index).cloned())
    }

    pub fn contains(&self, page_index: usize, zoom: f32) -> bool {
        self.state
            .lock()
            .pages
            .contains(&CacheKey::new(page_index, zoom))
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            pages: state.pages.len(),
            thumbnails: state.thumbnails.len(),
        }
    }
}
