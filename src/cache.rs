//! Process-wide cache of downloaded full-resolution images, keyed by image id.
//!
//! A [`LocalRef`] is the in-memory stand-in for the bytes the viewer fetched.
//! Dropping the last clone frees the pixels, so replacing an entry is enough
//! to release the previous one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use crate::fetch::{Fetcher, read_streamed};
use crate::loader::DecodedImage;

pub type LocalRef = Arc<DecodedImage>;

/// Callback used by background threads to nudge the UI.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct ImageCache {
    entries: HashMap<String, LocalRef>,
    /// Least recently used first.
    order: VecDeque<String>,
    used_bytes: u64,
    budget: u64,
}

impl ImageCache {
    pub fn new(budget: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            used_bytes: 0,
            budget,
        }
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&mut self, id: &str) -> Option<LocalRef> {
        let found = self.entries.get(id).cloned();
        if found.is_some() {
            self.touch(id);
        }
        found
    }

    /// Store a decoded image under `id`, releasing whatever was there before.
    pub fn set(&mut self, id: &str, image: DecodedImage) -> LocalRef {
        let local: LocalRef = Arc::new(image);
        if let Some(old) = self.entries.insert(id.to_string(), Arc::clone(&local)) {
            self.used_bytes -= old.mem_size();
        }
        self.used_bytes += local.mem_size();
        self.touch(id);
        self.evict(id);
        local
    }

    fn touch(&mut self, id: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == id) {
            self.order.remove(pos);
        }
        self.order.push_back(id.to_string());
    }

    fn evict(&mut self, keep: &str) {
        while self.used_bytes > self.budget {
            let Some(victim) = self.order.iter().find(|k| k.as_str() != keep).cloned() else {
                break;
            };
            self.order.retain(|k| k != &victim);
            if let Some(old) = self.entries.remove(&victim) {
                self.used_bytes -= old.mem_size();
                log::debug!("[cache] evicted {}", victim);
            }
        }
    }
}

/// Shared handle given to every viewer mount.
#[derive(Clone)]
pub struct CacheHandle {
    cache: Arc<Mutex<ImageCache>>,
    preloading: Arc<Mutex<HashSet<String>>>,
    fetcher: Arc<dyn Fetcher>,
    waker: Waker,
}

impl CacheHandle {
    pub fn new(cache: ImageCache, fetcher: Arc<dyn Fetcher>, waker: Waker) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
            preloading: Arc::new(Mutex::new(HashSet::new())),
            fetcher,
            waker,
        }
    }

    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }

    pub fn waker(&self) -> Waker {
        Arc::clone(&self.waker)
    }

    pub fn lock(&self) -> MutexGuard<'_, ImageCache> {
        self.cache.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, id: &str) -> Option<LocalRef> {
        self.lock().get(id)
    }

    pub fn set(&self, id: &str, image: DecodedImage) -> LocalRef {
        self.lock().set(id, image)
    }

    pub fn has(&self, id: &str) -> bool {
        self.lock().has(id)
    }

    #[cfg(test)]
    pub fn is_preloading(&self, id: &str) -> bool {
        self.preloading.lock().map(|p| p.contains(id)).unwrap_or(false)
    }

    /// Fetch and decode `path` in the background unless `id` is cached or already on its way.
    pub fn preload(&self, id: &str, path: &str) {
        if self.has(id) {
            return;
        }
        {
            let mut preloading = self.preloading.lock().unwrap_or_else(|p| p.into_inner());
            if !preloading.insert(id.to_string()) {
                return;
            }
        }
        log::debug!("[cache] preload {} from {}", id, path);

        let handle = self.clone();
        let id = id.to_string();
        let path = path.to_string();
        thread::spawn(move || {
            handle.preload_blocking(&id, &path);
        });
    }

    fn preload_blocking(&self, id: &str, path: &str) {
        let never = AtomicBool::new(false);
        let result = read_streamed(self.fetcher.as_ref(), path, &never, |_, _| {})
            .and_then(|bytes| bytes.map(|b| DecodedImage::from_bytes(path, &b)).transpose());
        match result {
            Ok(Some(decoded)) => {
                self.set(id, decoded);
                (self.waker)();
            }
            Ok(None) => {}
            Err(e) => log::warn!("Preload failed: {}", e),
        }
        if let Ok(mut preloading) = self.preloading.lock() {
            preloading.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{MemoryFetcher, png_bytes};

    fn image_of(bytes: usize) -> DecodedImage {
        DecodedImage {
            rgba_bytes: vec![1; bytes],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn set_twice_releases_first_reference() {
        let mut cache = ImageCache::new(u64::MAX);
        let first = cache.set("a", image_of(16));
        let weak = Arc::downgrade(&first);
        drop(first);
        assert!(weak.upgrade().is_some(), "cache still owns it");

        let second = cache.set("a", image_of(32));
        assert!(weak.upgrade().is_none(), "replaced entry was released");
        assert_eq!(cache.used_bytes, 32);
        let got = cache.get("a").unwrap();
        assert!(Arc::ptr_eq(&got, &second));
        assert_eq!(got.rgba_bytes.len(), 32);
    }

    #[test]
    fn eviction_is_lru_and_spares_newest() {
        let mut cache = ImageCache::new(100);
        cache.set("a", image_of(40));
        cache.set("b", image_of(40));
        cache.get("a");
        cache.set("c", image_of(40));
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));

        cache.set("big", image_of(500));
        assert!(cache.has("big"));
        assert_eq!(cache.entries.len(), 1);
    }

    #[test]
    fn preload_fills_cache_once() {
        let fetcher = Arc::new(MemoryFetcher::default().with("/p/b.jpg", png_bytes(4, 4)));
        let woke = Arc::new(AtomicBool::new(false));
        let woke2 = Arc::clone(&woke);
        let handle = CacheHandle::new(
            ImageCache::new(u64::MAX),
            fetcher.clone(),
            Arc::new(move || woke2.store(true, std::sync::atomic::Ordering::SeqCst)),
        );
        handle.preload_blocking("b", "/p/b.jpg");
        assert!(handle.has("b"));
        assert!(woke.load(std::sync::atomic::Ordering::SeqCst));

        handle.preload("b", "/p/b.jpg");
        assert_eq!(fetcher.request_count(), 1);
        assert!(!handle.is_preloading("b"));
    }

    #[test]
    fn failed_preload_leaves_cache_empty() {
        let handle = CacheHandle::new(ImageCache::new(u64::MAX), Arc::new(MemoryFetcher::default()), Arc::new(|| {}));
        handle.preload_blocking("x", "/missing.jpg");
        assert!(!handle.has("x"));
    }
}
