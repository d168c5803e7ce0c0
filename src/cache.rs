/*
 *  cache.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Small content-addressed LRU caches for processed artwork
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bitmap::{Bitmap, ContentHash};

/// Which transform produced a cached artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Bilinear thumbnail
    Resize,
    /// 1-bit dithered
    Dither,
    /// Blurred, faded full-canvas background
    Background,
    /// Accent colour extraction (no bitmap of interest)
    Accent,
}

/// Composite key: same art at a different size or variant is a different entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub hash: ContentHash,
    pub size: (u32, u32),
    pub variant: Variant,
}

impl CacheKey {
    pub fn new(hash: ContentHash, size: (u32, u32), variant: Variant) -> Self {
        Self { hash, size, variant }
    }
}

struct LruInner {
    entries: HashMap<CacheKey, Arc<Bitmap>>,
    order: VecDeque<CacheKey>, // front = least recently used
}

impl LruInner {
    fn touch(&mut self, key: CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| *k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key);
    }
}

/// Bounded strict-LRU cache. A `get` hit promotes the entry; `put` evicts from
/// the cold end once the bound is exceeded. Both run under one lock so readers
/// never observe a half-inserted entry.
pub struct ImageCache {
    name: &'static str,
    capacity: usize,
    inner: Mutex<LruInner>,
}

impl ImageCache {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            inner: Mutex::new(LruInner {
                entries: HashMap::with_capacity(capacity + 1),
                order: VecDeque::with_capacity(capacity + 1),
            }),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Bitmap>> {
        let mut inner = self.inner.lock();
        let hit = inner.entries.get(key).cloned();
        if hit.is_some() {
            inner.touch(*key);
        }
        hit
    }

    /// Presence check that does not affect recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Insert or replace; returns the evicted key, if any.
    pub fn put(&self, key: CacheKey, bitmap: Arc<Bitmap>) -> Option<CacheKey> {
        let mut inner = self.inner.lock();
        inner.entries.insert(key, bitmap);
        inner.touch(key);
        if inner.order.len() > self.capacity {
            if let Some(old) = inner.order.pop_front() {
                inner.entries.remove(&old);
                log::debug!("{} cache evicted {:?}", self.name, old);
                return Some(old);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

/// The named cache instances, one per artifact type.
pub struct ImageCaches {
    pub resized: ImageCache,
    pub dithered: ImageCache,
    pub background: ImageCache,
}

impl ImageCaches {
    pub fn new(resized: usize, dithered: usize, background: usize) -> Self {
        Self {
            resized: ImageCache::new("resized", resized),
            dithered: ImageCache::new("dithered", dithered),
            background: ImageCache::new("background", background),
        }
    }

    /// Cache instance for a variant; accent results are not cached as bitmaps.
    pub fn for_variant(&self, variant: Variant) -> Option<&ImageCache> {
        match variant {
            Variant::Resize => Some(&self.resized),
            Variant::Dither => Some(&self.dithered),
            Variant::Background => Some(&self.background),
            Variant::Accent => None,
        }
    }
}
