//! Medium proxy first, full resolution once its bytes have arrived.
//!
//! Each request gets a generation number and a cancel flag. Starting another
//! request, or dropping the loader, raises the flag on the previous one and
//! any event it still manages to emit is discarded by generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::cache::{CacheHandle, LocalRef, Waker};
use crate::fetch::{Fetcher, read_streamed};
use crate::gallery::ViewerImage;
use crate::loader::DecodedImage;

const PROGRESS_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub enum DisplaySource {
    /// Shown through ordinary path decoding.
    Path(String),
    /// Bytes downloaded by this loader (or an earlier one, via the cache).
    Local(LocalRef),
}

impl DisplaySource {
    pub fn path(&self) -> Option<&str> {
        match self {
            DisplaySource::Path(p) => Some(p),
            DisplaySource::Local(_) => None,
        }
    }
}

impl PartialEq for DisplaySource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DisplaySource::Path(a), DisplaySource::Path(b)) => a == b,
            (DisplaySource::Local(a), DisplaySource::Local(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    pub status: LoadStatus,
    pub display: DisplaySource,
    pub loaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress { generation: u64, loaded: u64, total: Option<u64> },
    Finished { generation: u64, image: DecodedImage },
    Failed { generation: u64, error: String },
}

impl LoadEvent {
    fn generation(&self) -> u64 {
        match self {
            LoadEvent::Progress { generation, .. }
            | LoadEvent::Finished { generation, .. }
            | LoadEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// Whether the full-resolution download may run at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPolicy {
    Full,
    /// Narrow viewports keep the medium proxy as the final image.
    ProxyOnly,
}

/// One full-resolution download, runnable on any thread.
pub struct FetchJob {
    pub generation: u64,
    pub source: String,
    cancel: Arc<AtomicBool>,
}

impl FetchJob {
    pub fn run(self, fetcher: &dyn Fetcher, mut emit: impl FnMut(LoadEvent)) {
        let generation = self.generation;
        let read = read_streamed(fetcher, &self.source, &self.cancel, |loaded, total| {
            emit(LoadEvent::Progress { generation, loaded, total })
        });
        let event = match read.and_then(|bytes| bytes.map(|b| DecodedImage::from_bytes(&self.source, &b)).transpose()) {
            Ok(Some(image)) => LoadEvent::Finished { generation, image },
            Ok(None) => return,
            Err(e) => LoadEvent::Failed { generation, error: e.to_string() },
        };
        if !self.cancel.load(Ordering::Acquire) {
            emit(event);
        }
    }

    /// Run on a background thread, reporting through `tx` and nudging the UI.
    pub fn spawn(self, fetcher: Arc<dyn Fetcher>, tx: Sender<LoadEvent>, waker: Waker) {
        thread::spawn(move || {
            self.run(fetcher.as_ref(), |event| {
                if tx.send(event).is_ok() {
                    waker();
                }
            });
        });
    }
}

pub struct ProgressiveLoader {
    cache: CacheHandle,
    image_id: Option<String>,
    full_path: String,
    state: LoadState,
    generation: u64,
    cancel: Option<Arc<AtomicBool>>,
    hide_progress_at: Option<Instant>,
    progress_visible: bool,
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
}

impl ProgressiveLoader {
    pub fn new(cache: CacheHandle) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            cache,
            image_id: None,
            full_path: String::new(),
            state: LoadState {
                status: LoadStatus::Idle,
                display: DisplaySource::Path(String::new()),
                loaded_bytes: 0,
                total_bytes: None,
            },
            generation: 0,
            cancel: None,
            hide_progress_at: None,
            progress_visible: false,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn display(&self) -> &DisplaySource {
        &self.state.display
    }

    pub fn progress_visible(&self) -> bool {
        self.progress_visible
    }

    /// Cancel whatever is in flight. Its late events will be ignored.
    pub fn abort(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::Release);
        }
        self.generation += 1;
    }

    /// Point the loader at a new image. Returns the download to run, if one is needed.
    pub fn request(&mut self, image: &ViewerImage, policy: DownloadPolicy) -> Option<FetchJob> {
        self.abort();
        self.image_id = Some(image.id.clone());
        self.full_path = image.file_path.clone();
        self.hide_progress_at = None;
        self.progress_visible = false;
        self.state.loaded_bytes = 0;
        self.state.total_bytes = None;

        let medium = match image.medium_path.as_deref() {
            Some(m) if m != image.file_path => m,
            _ => {
                self.state.display = DisplaySource::Path(image.file_path.clone());
                self.state.status = LoadStatus::Success;
                return None;
            }
        };
        self.state.display = DisplaySource::Path(medium.to_string());

        if policy == DownloadPolicy::ProxyOnly {
            self.state.status = LoadStatus::Success;
            return None;
        }

        if let Some(local) = self.cache.get(&image.id) {
            log::debug!("[load] cache hit for {}", image.id);
            self.state.display = DisplaySource::Local(local);
            self.state.status = LoadStatus::Success;
            return None;
        }

        self.state.status = LoadStatus::Loading;
        self.progress_visible = true;
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(Arc::clone(&cancel));
        Some(FetchJob {
            generation: self.generation,
            source: image.file_path.clone(),
            cancel,
        })
    }

    /// `request` plus running the download in the background.
    pub fn start(&mut self, image: &ViewerImage, policy: DownloadPolicy) {
        if let Some(job) = self.request(image, policy) {
            log::debug!("[load] fetching {}", job.source);
            job.spawn(self.cache.fetcher(), self.tx.clone(), self.cache.waker());
        }
    }

    /// Drain events delivered by background downloads. Returns true if state changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            changed |= self.apply(event, now);
        }
        changed
    }

    pub fn apply(&mut self, event: LoadEvent, now: Instant) -> bool {
        if event.generation() != self.generation || self.state.status != LoadStatus::Loading {
            log::debug!("[load] dropping stale event for generation {}", event.generation());
            return false;
        }
        match event {
            LoadEvent::Progress { loaded, total, .. } => {
                self.state.loaded_bytes = loaded;
                self.state.total_bytes = total;
            }
            LoadEvent::Finished { image, .. } => {
                let Some(id) = self.image_id.clone() else { return false };
                let local = self.cache.set(&id, image);
                self.state.display = DisplaySource::Local(local);
                self.state.status = LoadStatus::Success;
                self.cancel = None;
                let complete = matches!(self.state.total_bytes, Some(t) if t > 0 && self.state.loaded_bytes >= t);
                if complete {
                    self.hide_progress_at = Some(now + PROGRESS_GRACE);
                } else {
                    self.progress_visible = false;
                }
            }
            LoadEvent::Failed { error, .. } => {
                log::warn!("Full-resolution load failed, showing original path: {}", error);
                self.state.display = DisplaySource::Path(self.full_path.clone());
                self.state.status = LoadStatus::Error;
                self.cancel = None;
                self.progress_visible = false;
            }
        }
        true
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(at) = self.hide_progress_at {
            if now >= at {
                self.progress_visible = false;
                self.hide_progress_at = None;
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.hide_progress_at
    }
}

impl Drop for ProgressiveLoader {
    fn drop(&mut self) {
        self.abort();
    }
}
