use image::GenericImageView;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use winit::event_loop::EventLoopProxy;

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Decoded image data (CPU side, ready to blit)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }

    fn from_dynamic(img: image::DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            rgba_bytes: img.to_rgba8().into_raw(),
            width,
            height,
        }
    }

    /// Decode bytes that were downloaded rather than read from a path.
    pub fn from_bytes(source: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        let img = image::load_from_memory(bytes).map_err(|e| LoadError::Decode {
            path: source.to_string(),
            source: e,
        })?;
        Ok(Self::from_dynamic(img))
    }
}

/// Read and decode a path, optionally shrinking it to fit `target_size`.
pub fn decode_path(path: &str, target_size: Option<(u32, u32)>) -> Result<DecodedImage, LoadError> {
    let img = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => LoadError::Io { path: path.to_string(), source: io },
        other => LoadError::Decode { path: path.to_string(), source: other },
    })?;
    let img = match target_size {
        Some((w, h)) => img.thumbnail(w, h),
        None => img,
    };
    Ok(DecodedImage::from_dynamic(img))
}

// ---------------------------------------------------------------------------
// Source store: plain paths decoded on worker threads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkType {
    Full,
    Thumbnail,
}

pub const THUMBNAIL_SIZE: (u32, u32) = (160, 160);

type WorkKey = (String, WorkType);

pub struct CacheState {
    pub images: HashMap<String, Arc<DecodedImage>>,
    pub thumbnails: HashMap<String, Arc<DecodedImage>>,

    /// Requests in priority order; the front is decoded first.
    wanted: VecDeque<WorkKey>,
    /// Same keys as `wanted`, for membership checks.
    queued: HashSet<WorkKey>,
    in_progress: HashSet<WorkKey>,
    pub errors: HashMap<String, String>,
    thumbnail_errors: HashSet<String>,

    /// Full images, least recently requested first.
    recent: VecDeque<String>,
    pub used_bytes: u64,
    pub budget: u64,
}

pub type SharedState = Arc<(Mutex<CacheState>, Condvar)>;

pub fn lock_state(shared: &SharedState) -> MutexGuard<'_, CacheState> {
    shared.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CacheState {
    pub fn new(budget: u64) -> Self {
        Self {
            images: HashMap::new(),
            thumbnails: HashMap::new(),
            wanted: VecDeque::new(),
            queued: HashSet::new(),
            in_progress: HashSet::new(),
            errors: HashMap::new(),
            thumbnail_errors: HashSet::new(),
            recent: VecDeque::new(),
            used_bytes: 0,
            budget,
        }
    }

    pub fn get(&self, path: &str) -> Option<Arc<DecodedImage>> {
        self.images.get(path).cloned()
    }

    pub fn get_thumbnail(&self, path: &str) -> Option<Arc<DecodedImage>> {
        self.thumbnails.get(path).cloned()
    }

    fn is_available(&self, key: &WorkKey) -> bool {
        if self.in_progress.contains(key) {
            return false;
        }
        let (path, wtype) = key;
        match wtype {
            WorkType::Full => !self.images.contains_key(path) && !self.errors.contains_key(path),
            WorkType::Thumbnail => {
                !self.thumbnails.contains_key(path) && !self.thumbnail_errors.contains(path)
            }
        }
    }

    /// Ask for a full-size decode. Urgent requests jump the queue.
    pub fn request(&mut self, path: &str, urgent: bool) {
        self.touch(path);
        let key = (path.to_string(), WorkType::Full);
        if !self.is_available(&key) {
            return;
        }
        if !self.queued.insert(key.clone()) {
            if !urgent {
                return;
            }
            self.wanted.retain(|k| k != &key);
        }
        if urgent {
            self.wanted.push_front(key);
        } else {
            self.wanted.push_back(key);
        }
    }

    pub fn request_thumbnail(&mut self, path: &str) {
        let key = (path.to_string(), WorkType::Thumbnail);
        if self.is_available(&key) && self.queued.insert(key.clone()) {
            self.wanted.push_back(key);
        }
    }

    fn touch(&mut self, path: &str) {
        if let Some(pos) = self.recent.iter().position(|p| p == path) {
            self.recent.remove(pos);
        }
        self.recent.push_back(path.to_string());
    }

    pub fn find_work(&mut self) -> Option<WorkKey> {
        while let Some(key) = self.wanted.pop_front() {
            self.queued.remove(&key);
            if self.is_available(&key) {
                return Some(key);
            }
        }
        None
    }

    pub fn insert(&mut self, path: String, decoded: DecodedImage, wtype: WorkType) {
        match wtype {
            WorkType::Full => {
                if let Some(old) = self.images.remove(&path) {
                    self.used_bytes -= old.mem_size();
                }
                self.used_bytes += decoded.mem_size();
                self.images.insert(path.clone(), Arc::new(decoded));
                self.touch(&path);
                self.evict_stale();
            }
            WorkType::Thumbnail => {
                self.thumbnails.insert(path, Arc::new(decoded));
            }
        }
    }

    fn fail(&mut self, path: String, wtype: WorkType, err: String) {
        match wtype {
            WorkType::Full => {
                self.errors.insert(path, err);
            }
            WorkType::Thumbnail => {
                self.thumbnail_errors.insert(path);
            }
        }
    }

    /// Drop least recently requested images until under budget, always keeping the newest.
    fn evict_stale(&mut self) {
        while self.used_bytes > self.budget && self.images.len() > 1 {
            let Some(oldest) = self.recent.iter().position(|p| self.images.contains_key(p)) else {
                break;
            };
            if oldest + 1 == self.recent.len() {
                break;
            }
            if let Some(path) = self.recent.remove(oldest) {
                if let Some(img) = self.images.remove(&path) {
                    self.used_bytes -= img.mem_size();
                    log::debug!("[source] evicted {}", path);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// User events for waking the UI from worker threads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UserEvent {
    SourceReady(String),
    ThumbnailReady(String),
    /// The progressive loader or the shared cache has news for the viewer.
    LoaderUpdate,
}

// ---------------------------------------------------------------------------
// Background decode workers
// ---------------------------------------------------------------------------

pub fn spawn_decode_workers(shared: SharedState, proxy: EventLoopProxy<UserEvent>, num_threads: usize) {
    for _ in 0..num_threads {
        let shared = Arc::clone(&shared);
        let proxy = proxy.clone();
        thread::spawn(move || {
            loop {
                let (path, wtype) = {
                    let (_, cvar) = &*shared;
                    let mut state = lock_state(&shared);
                    loop {
                        if let Some(key) = state.find_work() {
                            state.in_progress.insert(key.clone());
                            break key;
                        }
                        state = cvar.wait(state).unwrap_or_else(|p| p.into_inner());
                    }
                };

                let target_size = match wtype {
                    WorkType::Full => None,
                    WorkType::Thumbnail => Some(THUMBNAIL_SIZE),
                };
                let result = decode_path(&path, target_size);

                {
                    let (_, cvar) = &*shared;
                    let mut state = lock_state(&shared);
                    state.in_progress.remove(&(path.clone(), wtype));
                    match result {
                        Ok(decoded) => state.insert(path.clone(), decoded, wtype),
                        Err(e) => {
                            log::warn!("Could not decode {}", e);
                            state.fail(path.clone(), wtype, e.to_string());
                        }
                    }
                    cvar.notify_all();
                }

                let event = match wtype {
                    WorkType::Full => UserEvent::SourceReady(path),
                    WorkType::Thumbnail => UserEvent::ThumbnailReady(path),
                };
                let _ = proxy.send_event(event);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_of(bytes: usize) -> DecodedImage {
        DecodedImage {
            rgba_bytes: vec![0; bytes],
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn urgent_requests_jump_the_queue() {
        let mut s = CacheState::new(1000);
        s.request("a", false);
        s.request("b", false);
        s.request("c", true);
        assert_eq!(s.find_work(), Some(("c".to_string(), WorkType::Full)));
        assert_eq!(s.find_work(), Some(("a".to_string(), WorkType::Full)));
    }

    #[test]
    fn decoded_and_failed_paths_are_not_requeued() {
        let mut s = CacheState::new(1000);
        s.insert("a".into(), image_of(10), WorkType::Full);
        s.fail("b".into(), WorkType::Full, "bad".into());
        s.request("a", true);
        s.request("b", true);
        assert_eq!(s.find_work(), None);
    }

    #[test]
    fn eviction_drops_least_recent_and_keeps_newest() {
        let mut s = CacheState::new(250);
        s.insert("a".into(), image_of(100), WorkType::Full);
        s.insert("b".into(), image_of(100), WorkType::Full);
        s.request("a", false);
        s.insert("c".into(), image_of(100), WorkType::Full);
        assert!(s.get("b").is_none());
        assert!(s.get("a").is_some());
        assert!(s.get("c").is_some());
        assert_eq!(s.used_bytes, 200);

        s.insert("huge".into(), image_of(1000), WorkType::Full);
        assert!(s.get("huge").is_some());
        assert_eq!(s.images.len(), 1);
    }

    #[test]
    fn thumbnails_live_outside_the_budget() {
        let mut s = CacheState::new(1);
        s.request_thumbnail("a");
        assert_eq!(s.find_work(), Some(("a".to_string(), WorkType::Thumbnail)));
        s.insert("a".into(), image_of(100), WorkType::Thumbnail);
        assert!(s.get_thumbnail("a").is_some());
        assert_eq!(s.used_bytes, 0);
    }

    #[test]
    fn repeated_requests_queue_once() {
        let mut s = CacheState::new(1000);
        for _ in 0..3 {
            s.request_thumbnail("a");
            s.request_thumbnail("b");
            s.request("c", false);
        }
        assert_eq!(s.wanted.len(), 3);
        assert_eq!(s.queued.len(), 3);

        s.request("b", true);
        assert_eq!(s.find_work(), Some(("b".to_string(), WorkType::Full)));
        assert_eq!(s.find_work(), Some(("a".to_string(), WorkType::Thumbnail)));
        assert_eq!(s.find_work(), Some(("b".to_string(), WorkType::Thumbnail)));
        assert_eq!(s.find_work(), Some(("c".to_string(), WorkType::Full)));
        assert_eq!(s.find_work(), None);
        assert!(s.queued.is_empty());
    }

    #[test]
    fn decodes_downloaded_bytes() {
        let bytes = crate::fetch::testing::png_bytes(3, 2);
        let img = DecodedImage::from_bytes("x.png", &bytes).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert!(DecodedImage::from_bytes("junk", b"not an image").is_err());
    }
}
