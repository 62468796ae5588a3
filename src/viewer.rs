//! The photo viewer: wires zoom, drag, progressive loading and slide
//! transitions together and turns input into navigation.
//!
//! Gesture handlers only update the engines and queue a transform; the
//! window shell calls [`PhotoViewer::frame`] once per redraw, which drains
//! that queue and runs every timer.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Instant;

use crate::cache::CacheHandle;
use crate::config::ViewerConfig;
use crate::drag::{Available, DragEngine, DragRelease, PointerKind, SettleAnimation};
use crate::gallery::{Direction, Neighbors, Router, ViewerProps, gallery_path, image_path};
use crate::loader::{DecodedImage, SharedState, lock_state};
use crate::metadata::{PhotoMetadata, spawn_read_metadata};
use crate::progressive::{DisplaySource, DownloadPolicy, LoadStatus, ProgressiveLoader};
use crate::session::SessionStore;
use crate::slide::{SlideEngine, SlideOffsets, Snapshot};
use crate::zoom::{Offset, Size, ZoomEngine};

/// A point in time as both a monotonic instant and unix milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct Now {
    pub instant: Instant,
    pub unix_ms: i64,
}

impl Now {
    pub fn capture() -> Self {
        Self {
            instant: Instant::now(),
            unix_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    Escape,
    ArrowLeft,
    ArrowRight,
    Other,
}

/// Shared services handed to each viewer mount.
#[derive(Clone)]
pub struct ViewerDeps {
    pub cache: CacheHandle,
    pub sources: SharedState,
    pub session: Rc<dyn SessionStore>,
    pub config: ViewerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f32,
    pub offset: Offset,
}

impl Transform {
    const IDENTITY: Transform = Transform { scale: 1.0, offset: Offset::ZERO };
}

/// Latest gesture-driven transform, written freely and applied once per frame.
#[derive(Debug)]
struct PendingTransform {
    pending: Option<Transform>,
    applied: Transform,
}

impl PendingTransform {
    fn new() -> Self {
        Self { pending: None, applied: Transform::IDENTITY }
    }

    fn write(&mut self, t: Transform) {
        self.pending = Some(t);
    }

    fn flush(&mut self) -> bool {
        match self.pending.take() {
            Some(t) => {
                self.applied = t;
                true
            }
            None => false,
        }
    }

    fn reset(&mut self) {
        self.pending = None;
        self.applied = Transform::IDENTITY;
    }
}

#[derive(Debug, Clone)]
pub struct ThumbView {
    pub pixels: Option<Arc<DecodedImage>>,
    pub current: bool,
}

#[derive(Debug, Clone)]
pub struct SlideView {
    pub offsets: SlideOffsets,
    pub outgoing: Option<Arc<DecodedImage>>,
    pub outgoing_alt: String,
}

/// Everything needed to draw one frame of the viewer.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub image: Option<Arc<DecodedImage>>,
    pub transform: Transform,
    pub slide: Option<SlideView>,
    pub zoom_indicator: Option<f32>,
    pub hint_visible: bool,
    pub progress: Option<(u64, Option<u64>)>,
    pub load_status: LoadStatus,
    /// Decode failure for the path currently on display.
    pub error: Option<String>,
    pub has_prev: bool,
    pub has_next: bool,
    pub title: String,
    pub live: bool,
    pub metadata: Option<Vec<String>>,
    pub thumbnails: Vec<ThumbView>,
    pub mobile: bool,
}

pub struct PhotoViewer {
    props: ViewerProps,
    neighbors: Neighbors,
    deps: ViewerDeps,

    zoom: ZoomEngine,
    drag: DragEngine,
    loader: ProgressiveLoader,
    slide: SlideEngine,
    transform: PendingTransform,
    settle: Option<SettleAnimation>,
    touches: HashMap<u64, (f32, f32)>,

    logical_width: f32,
    metadata: PhotoMetadata,
    metadata_rx: Option<Receiver<PhotoMetadata>>,
    /// Path currently asked of the source store for display.
    requested_display: Option<String>,
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

impl PhotoViewer {
    pub fn new(props: ViewerProps, deps: ViewerDeps, logical_width: f32, now: Now) -> Self {
        let mut viewer = Self {
            neighbors: props.resolve_neighbors(),
            props,
            zoom: ZoomEngine::new(),
            drag: DragEngine::new(deps.config.swipe),
            loader: ProgressiveLoader::new(deps.cache.clone()),
            slide: SlideEngine::new(Rc::clone(&deps.session)),
            transform: PendingTransform::new(),
            settle: None,
            touches: HashMap::new(),
            logical_width,
            metadata: PhotoMetadata::default(),
            metadata_rx: None,
            requested_display: None,
            deps,
        };
        log::info!("Viewer mounted on {}", viewer.props.image.id);
        viewer.on_identity(now);
        viewer.preload_neighbors();
        viewer
    }

    pub fn props(&self) -> &ViewerProps {
        &self.props
    }

    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    pub fn zoom(&self) -> &ZoomEngine {
        &self.zoom
    }

    pub fn loader(&self) -> &ProgressiveLoader {
        &self.loader
    }

    pub fn slide(&self) -> &SlideEngine {
        &self.slide
    }

    pub fn is_mobile(&self) -> bool {
        self.deps.config.is_mobile(self.logical_width)
    }

    fn available(&self) -> Available {
        Available {
            prev: self.neighbors.prev.is_some(),
            next: self.neighbors.next.is_some(),
        }
    }

    /// New props on the same mount, e.g. after navigating to a neighbour.
    pub fn set_props(&mut self, props: ViewerProps, now: Now) {
        let identity_changed = props.image.id != self.props.image.id;
        let neighbors = props.resolve_neighbors();
        let neighbors_changed = neighbors != self.neighbors;
        self.props = props;
        self.neighbors = neighbors;
        if identity_changed {
            self.on_identity(now);
        }
        if identity_changed || neighbors_changed {
            self.preload_neighbors();
        }
    }

    fn on_identity(&mut self, now: Now) {
        self.zoom.reset();
        self.drag.cancel();
        self.settle = None;
        self.touches.clear();
        self.transform.reset();
        self.requested_display = None;

        let policy = if self.is_mobile() { DownloadPolicy::ProxyOnly } else { DownloadPolicy::Full };
        self.loader.start(&self.props.image, policy);
        self.slide.on_identity(&self.props.image.id, now.unix_ms, now.instant);
        let file_path = self.props.image.file_path.clone();
        self.metadata = PhotoMetadata::named(&file_path);
        self.metadata_rx = Some(spawn_read_metadata(file_path, self.deps.cache.waker()));

        {
            let (_, cvar) = &*self.deps.sources;
            let mut sources = lock_state(&self.deps.sources);
            if let Some(ctx) = self.slide.context() {
                sources.request(&ctx.from_src, true);
            }
            if let Some(thumbs) = &self.props.thumbnails {
                if self.deps.config.show_thumbnails {
                    for t in thumbs {
                        sources.request_thumbnail(t.strip_path());
                    }
                }
            }
            cvar.notify_all();
        }
        self.request_display_source();
    }

    fn request_display_source(&mut self) {
        let Some(path) = self.loader.display().path().map(str::to_string) else {
            return;
        };
        if self.requested_display.as_deref() == Some(path.as_str()) {
            return;
        }
        let (_, cvar) = &*self.deps.sources;
        lock_state(&self.deps.sources).request(&path, true);
        cvar.notify_all();
        self.requested_display = Some(path);
    }

    fn preload_neighbors(&self) {
        if self.is_mobile() {
            return;
        }
        for n in [&self.neighbors.prev, &self.neighbors.next].into_iter().flatten() {
            if let Some(path) = &n.path {
                self.deps.cache.preload(&n.id, path);
            }
        }
    }

    pub fn set_viewport(&mut self, logical_width: f32) {
        self.logical_width = logical_width;
    }

    /// Returns true when the size changed and another frame is needed.
    pub fn set_container(&mut self, size: Size) -> bool {
        if self.zoom.container() == Some(size) {
            return false;
        }
        self.zoom.set_container(size);
        self.queue_transform();
        true
    }

    fn queue_transform(&mut self) {
        self.transform.write(Transform {
            scale: self.zoom.scale(),
            offset: self.zoom.offset(),
        });
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn outgoing_snapshot(&self) -> Snapshot {
        Snapshot {
            src: self.props.image.preview_path().to_string(),
            alt: self.props.image.alt_text().to_string(),
            id: self.props.image.id.clone(),
        }
    }

    /// Go to the neighbour in `direction`. Returns false when there is none.
    pub fn navigate(&mut self, direction: Direction, router: &mut dyn Router, now: Now) -> bool {
        let Some(target) = self.neighbors.get(direction).cloned() else {
            return false;
        };
        log::debug!("[nav] {:?} {} -> {}", direction, self.props.image.id, target.id);
        self.slide.mark_pending_direction(direction, self.outgoing_snapshot(), now.unix_ms);
        if !self.is_mobile() {
            if let Some(path) = &target.path {
                self.deps.cache.preload(&target.id, path);
            }
        }
        router.push(image_path(&self.props.locale, &target.id));
        true
    }

    pub fn key(&mut self, key: ViewerKey, router: &mut dyn Router, now: Now) -> bool {
        match key {
            ViewerKey::Escape => {
                router.push(gallery_path(&self.props.locale));
                true
            }
            ViewerKey::ArrowLeft => self.navigate(Direction::Prev, router, now),
            ViewerKey::ArrowRight => self.navigate(Direction::Next, router, now),
            ViewerKey::Other => false,
        }
    }

    pub fn thumbnail_click(&mut self, target_id: &str, router: &mut dyn Router, now: Now) {
        if target_id == self.props.image.id {
            return;
        }
        if let Some(thumbs) = &self.props.thumbnails {
            let pos = |id: &str| thumbs.iter().position(|t| t.id == id);
            if let (Some(from), Some(to)) = (pos(&self.props.image.id), pos(target_id)) {
                let direction = if to > from { Direction::Next } else { Direction::Prev };
                self.slide.mark_pending_direction(direction, self.outgoing_snapshot(), now.unix_ms);
            }
        }
        router.push(image_path(&self.props.locale, target_id));
    }

    // -----------------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------------

    pub fn wheel(&mut self, delta_y: f32, now: Now) {
        self.zoom.wheel(delta_y, now.instant);
        self.settle = None;
        self.queue_transform();
    }

    pub fn double_click(&mut self, now: Now) {
        self.drag.cancel();
        self.zoom.double_click(now.instant);
        self.settle = None;
        self.queue_transform();
    }

    pub fn pointer_down(&mut self, pos: (f32, f32)) {
        self.begin_drag(PointerKind::Mouse, pos);
    }

    pub fn pointer_move(&mut self, pos: (f32, f32)) {
        self.continue_drag(pos);
    }

    pub fn pointer_up(&mut self, router: &mut dyn Router, now: Now) {
        self.finish_drag(router, now);
    }

    fn begin_drag(&mut self, kind: PointerKind, pos: (f32, f32)) {
        self.settle = None;
        self.zoom.dismiss_hint();
        self.drag.press(kind, pos, self.zoom.offset());
    }

    fn continue_drag(&mut self, pos: (f32, f32)) {
        if let Some(offset) = self.drag.drag_move(pos, &self.zoom) {
            self.zoom.set_offset(offset);
            self.queue_transform();
        }
    }

    fn finish_drag(&mut self, router: &mut dyn Router, now: Now) {
        match self.drag.release(&self.zoom, self.available()) {
            DragRelease::Ignored | DragRelease::Panned => {}
            DragRelease::SnapBack { from } => self.snap_back(from, now),
            DragRelease::Swipe { direction, from } => {
                self.snap_back(from, now);
                self.navigate(direction, router, now);
            }
        }
    }

    fn snap_back(&mut self, from: Offset, now: Now) {
        self.zoom.set_offset(Offset::ZERO);
        self.queue_transform();
        if from != Offset::ZERO {
            self.settle = Some(SettleAnimation::new(from, now.instant));
        }
    }

    fn pinch_distance(&self) -> Option<f32> {
        let mut points = self.touches.values();
        let a = *points.next()?;
        let b = *points.next()?;
        Some(distance(a, b))
    }

    pub fn touch_start(&mut self, id: u64, pos: (f32, f32)) {
        self.touches.insert(id, pos);
        match self.touches.len() {
            1 => self.begin_drag(PointerKind::Touch, pos),
            2 => {
                self.drag.begin_pinch();
                if let Some(d) = self.pinch_distance() {
                    self.zoom.pinch_start(d);
                }
            }
            _ => {}
        }
    }

    pub fn touch_move(&mut self, id: u64, pos: (f32, f32), now: Now) {
        if let Some(p) = self.touches.get_mut(&id) {
            *p = pos;
        } else {
            return;
        }
        if self.zoom.is_pinching() {
            if let Some(d) = self.pinch_distance() {
                self.zoom.pinch_move(d, now.instant);
                self.queue_transform();
            }
        } else if self.touches.len() == 1 {
            self.continue_drag(pos);
        }
    }

    pub fn touch_end(&mut self, id: u64, router: &mut dyn Router, now: Now) {
        if self.touches.remove(&id).is_none() {
            return;
        }
        if self.drag.is_pinching() {
            if self.touches.len() < 2 {
                self.zoom.pinch_end();
            }
            if self.touches.is_empty() {
                self.drag.end_pinch();
            }
            self.queue_transform();
            return;
        }
        if self.touches.is_empty() {
            self.finish_drag(router, now);
        }
    }

    pub fn touch_cancel(&mut self, now: Now) {
        self.touches.clear();
        self.zoom.pinch_end();
        self.drag.end_pinch();
        self.drag.cancel();
        if !self.zoom.is_zoomed() {
            self.snap_back(self.zoom.offset(), now);
        }
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Drain background loader and metadata results. Returns true when a redraw is due.
    pub fn poll(&mut self, now: Now) -> bool {
        let mut changed = self.loader.poll(now.instant);
        if changed {
            self.request_display_source();
        }
        match self.metadata_rx.as_ref().map(|rx| rx.try_recv()) {
            Some(Ok(metadata)) => {
                self.metadata = metadata;
                self.metadata_rx = None;
                changed = true;
            }
            Some(Err(TryRecvError::Disconnected)) => self.metadata_rx = None,
            Some(Err(TryRecvError::Empty)) | None => {}
        }
        changed
    }

    fn display_pixels(&self) -> Option<Arc<DecodedImage>> {
        match self.loader.display() {
            DisplaySource::Local(local) => Some(Arc::clone(local)),
            DisplaySource::Path(path) => {
                let sources = lock_state(&self.deps.sources);
                sources.get(path).or_else(|| {
                    // Keep showing the medium proxy while the fallback path decodes.
                    self.props.image.medium_path.as_deref().and_then(|m| sources.get(m))
                })
            }
        }
    }

    /// One animation frame: flush the queued transform, run timers, describe the frame.
    pub fn frame(&mut self, now: Now) -> FrameState {
        self.poll(now);
        self.transform.flush();
        self.zoom.tick(now.instant);
        self.loader.tick(now.instant);

        let image = self.display_pixels();
        if let Some(img) = &image {
            let natural = Size::new(img.width as f32, img.height as f32);
            let same_ratio = self
                .zoom
                .natural()
                .map(|n| (n.w / n.h - natural.w / natural.h).abs() < 1e-3)
                .unwrap_or(false);
            if !same_ratio {
                self.zoom.set_natural(natural);
                self.queue_transform();
                self.transform.flush();
            }
        }

        let mut transform = self.transform.applied;
        if let Some(settle) = self.settle {
            if settle.is_finished(now.instant) {
                self.settle = None;
            } else {
                transform.offset = settle.offset_at(now.instant);
            }
        }

        self.slide.advance(now.instant);
        let slide = self.slide.offsets(now.instant).and_then(|offsets| {
            let ctx = self.slide.context()?;
            Some(SlideView {
                offsets,
                outgoing: lock_state(&self.deps.sources).get(&ctx.from_src),
                outgoing_alt: ctx.from_alt.clone(),
            })
        });

        let mobile = self.is_mobile();
        let dimensions = image.as_ref().map(|i| (i.width, i.height));
        let thumbnails = match &self.props.thumbnails {
            Some(thumbs) if self.deps.config.show_thumbnails => {
                let sources = lock_state(&self.deps.sources);
                thumbs
                    .iter()
                    .map(|t| ThumbView {
                        pixels: sources.get_thumbnail(t.strip_path()),
                        current: t.id == self.props.image.id,
                    })
                    .collect()
            }
            _ => Vec::new(),
        };

        let error = self
            .loader
            .display()
            .path()
            .and_then(|p| lock_state(&self.deps.sources).errors.get(p).cloned());
        let state = self.loader.state();
        FrameState {
            image,
            transform,
            slide,
            zoom_indicator: self.zoom.indicator_visible().then(|| self.zoom.scale()),
            hint_visible: self.zoom.hint_visible(),
            progress: self.loader.progress_visible().then_some((state.loaded_bytes, state.total_bytes)),
            load_status: state.status,
            error,
            has_prev: self.neighbors.prev.is_some(),
            has_next: self.neighbors.next.is_some(),
            title: self.props.image.alt_text().to_string(),
            live: self.props.image.is_live_photo,
            metadata: (!mobile).then(|| self.metadata.lines(dimensions)),
            thumbnails,
            mobile,
        }
    }

    /// True while something moves on screen and frames should keep coming.
    pub fn is_animating(&self) -> bool {
        self.settle.is_some() || self.slide.context().is_some()
    }

    /// Earliest timer the event loop should wake up for.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.zoom.next_deadline(),
            self.loader.next_deadline(),
            self.slide.next_deadline(),
            self.settle.map(|s| s.deadline()),
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ImageCache;
    use crate::fetch::testing::{MemoryFetcher, png_bytes};
    use crate::gallery::testing::RecordingRouter;
    use crate::gallery::{Gallery, ViewerImage};
    use crate::loader::CacheState;
    use crate::session::testing::MemoryStore;
    use crate::slide::{SLIDE_SLOT, SlideDirection};
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    fn gallery() -> Gallery {
        Gallery::new(vec![
            ViewerImage::new("a", "/img/a.jpg").with_medium("/img/a.webp"),
            ViewerImage::new("b", "/img/b.jpg").with_medium("/img/b.webp"),
            ViewerImage::new("c", "/img/c.jpg"),
        ])
    }

    fn deps(session: Rc<MemoryStore>) -> ViewerDeps {
        ViewerDeps {
            cache: CacheHandle::new(ImageCache::new(u64::MAX), Arc::new(MemoryFetcher::default()), Arc::new(|| {})),
            sources: Arc::new((Mutex::new(CacheState::new(u64::MAX)), Condvar::new())),
            session,
            config: ViewerConfig::default(),
        }
    }

    fn requests_for(fetcher: &MemoryFetcher, path: &str) -> usize {
        fetcher.requests.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            if Instant::now() > deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn now_at(base: Instant, ms: u64) -> Now {
        Now { instant: base + Duration::from_millis(ms), unix_ms: 1_000_000 + ms as i64 }
    }

    fn mount(id: &str, session: Rc<MemoryStore>, width: f32, t: Now) -> PhotoViewer {
        let props = gallery().props_for(id, "en", false).unwrap();
        let mut v = PhotoViewer::new(props, deps(session), width, t);
        v.set_container(Size::new(1000.0, 800.0));
        v.zoom.set_natural(Size::new(1000.0, 800.0));
        v
    }

    #[test]
    fn mouse_swipe_navigates_to_next() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("a", Rc::new(MemoryStore::default()), 1280.0, t);
        let mut router = RecordingRouter::default();
        v.pointer_down((300.0, 400.0));
        v.pointer_move((240.0, 400.0));
        v.pointer_move((180.0, 400.0));
        v.pointer_up(&mut router, t);
        assert_eq!(router.pushed, ["/en/gallery/b"]);
        assert_eq!(v.zoom().offset(), Offset::ZERO);
        assert!(v.is_animating(), "drag offset settles back");
    }

    #[test]
    fn short_swipe_or_missing_neighbour_stays() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("c", Rc::new(MemoryStore::default()), 1280.0, t);
        let mut router = RecordingRouter::default();
        v.pointer_down((300.0, 400.0));
        v.pointer_move((150.0, 400.0));
        v.pointer_up(&mut router, t);
        v.pointer_down((300.0, 400.0));
        v.pointer_move((350.0, 400.0));
        v.pointer_up(&mut router, t);
        assert!(router.pushed.is_empty());
    }

    #[test]
    fn keys_navigate_and_escape_returns_to_index() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("b", Rc::new(MemoryStore::default()), 1280.0, t);
        let mut router = RecordingRouter::default();
        assert!(v.key(ViewerKey::ArrowLeft, &mut router, t));
        assert!(v.key(ViewerKey::ArrowRight, &mut router, t));
        assert!(v.key(ViewerKey::Escape, &mut router, t));
        assert!(!v.key(ViewerKey::Other, &mut router, t));
        assert_eq!(router.pushed, ["/en/gallery/a", "/en/gallery/c", "/en/gallery"]);

        let mut first = mount("a", Rc::new(MemoryStore::default()), 1280.0, t);
        assert!(!first.key(ViewerKey::ArrowLeft, &mut router, t));
        assert_eq!(router.pushed.len(), 3);
    }

    #[test]
    fn identity_change_resets_zoom() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("a", Rc::new(MemoryStore::default()), 1280.0, t);
        v.double_click(t);
        v.pointer_down((500.0, 400.0));
        v.pointer_move((300.0, 300.0));
        assert!(v.zoom().scale() > 1.0);
        assert_ne!(v.zoom().offset(), Offset::ZERO);

        v.set_props(gallery().props_for("b", "en", false).unwrap(), t);
        assert_eq!(v.zoom().scale(), 1.0);
        assert_eq!(v.zoom().offset(), Offset::ZERO);
        assert!(v.zoom().hint_visible());
        let frame = v.frame(t);
        assert_eq!(frame.transform, Transform::IDENTITY);
    }

    #[test]
    fn remount_after_keyboard_navigation_slides_in() {
        let session = Rc::new(MemoryStore::default());
        let base = Instant::now();
        let mut router = RecordingRouter::default();
        let mut a = mount("a", session.clone(), 1280.0, now_at(base, 0));
        a.key(ViewerKey::ArrowRight, &mut router, now_at(base, 0));
        drop(a);

        let mut b = mount("b", session.clone(), 1280.0, now_at(base, 200));
        let ctx = b.slide().context().unwrap();
        assert_eq!(ctx.direction, SlideDirection::Left);
        assert_eq!(ctx.from_src, "/img/a.webp");
        assert!(session.get(SLIDE_SLOT).unwrap().is_none());

        let first = b.frame(now_at(base, 216));
        assert_eq!(first.slide.unwrap().offsets.incoming, 1.0);
        let done = b.frame(now_at(base, 600));
        assert!(done.slide.is_none());
    }

    #[test]
    fn stale_hint_plays_no_transition() {
        let session = Rc::new(MemoryStore::default());
        let base = Instant::now();
        let mut router = RecordingRouter::default();
        let mut a = mount("a", session.clone(), 1280.0, now_at(base, 0));
        a.key(ViewerKey::ArrowRight, &mut router, now_at(base, 0));
        drop(a);
        let b = mount("b", session, 1280.0, now_at(base, 3000));
        assert!(b.slide().context().is_none());
    }

    #[test]
    fn transform_writes_coalesce_per_frame() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("a", Rc::new(MemoryStore::default()), 1280.0, t);
        v.frame(t);
        v.wheel(-1.0, t);
        v.wheel(-1.0, t);
        v.wheel(-1.0, t);
        assert!(v.transform.pending.is_some());
        let frame = v.frame(t);
        assert!((frame.transform.scale - 1.1f32.powi(3)).abs() < 1e-4);
        assert!(v.transform.pending.is_none());
        assert!(!v.transform.flush(), "nothing left after one flush");
    }

    #[test]
    fn pinch_zooms_and_never_swipes() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("b", Rc::new(MemoryStore::default()), 1280.0, t);
        let mut router = RecordingRouter::default();
        v.touch_start(1, (400.0, 400.0));
        v.touch_start(2, (500.0, 400.0));
        v.touch_move(2, (600.0, 400.0), t);
        assert!((v.zoom().scale() - 2.0).abs() < 1e-5);
        v.touch_move(1, (100.0, 400.0), t);
        v.touch_end(2, &mut router, t);
        v.touch_move(1, (-300.0, 400.0), t);
        v.touch_end(1, &mut router, t);
        assert!(router.pushed.is_empty());
        assert!(!v.zoom().is_pinching());
    }

    #[test]
    fn single_finger_swipe_uses_touch_threshold() {
        let t = now_at(Instant::now(), 0);
        let mut v = mount("b", Rc::new(MemoryStore::default()), 1280.0, t);
        let mut router = RecordingRouter::default();
        v.touch_start(7, (200.0, 400.0));
        v.touch_move(7, (290.0, 405.0), t);
        v.touch_end(7, &mut router, t);
        assert_eq!(router.pushed, ["/en/gallery/a"]);
    }

    #[test]
    fn mobile_keeps_medium_and_skips_preload() {
        let t = now_at(Instant::now(), 0);
        let v = mount("a", Rc::new(MemoryStore::default()), 390.0, t);
        assert!(v.is_mobile());
        assert_eq!(v.loader().state().status, LoadStatus::Success);
        assert_eq!(v.loader().display().path(), Some("/img/a.webp"));
        assert!(!v.deps.cache.is_preloading("b"));
    }

    #[test]
    fn desktop_starts_full_download() {
        let t = now_at(Instant::now(), 0);
        let v = mount("a", Rc::new(MemoryStore::default()), 1280.0, t);
        assert_eq!(v.loader().state().status, LoadStatus::Loading);
        assert_eq!(v.loader().display().path(), Some("/img/a.webp"));
    }

    #[test]
    fn thumbnail_strip_defines_neighbours() {
        let t = now_at(Instant::now(), 0);
        let mut props = gallery().props_for("b", "en", true).unwrap();
        props.thumbnails.as_mut().unwrap().reverse();
        let mut v = PhotoViewer::new(props, deps(Rc::new(MemoryStore::default())), 1280.0, t);
        assert_eq!(v.neighbors().prev.as_ref().unwrap().id, "c");
        assert_eq!(v.neighbors().next.as_ref().unwrap().id, "a");

        let mut router = RecordingRouter::default();
        v.thumbnail_click("a", &mut router, t);
        v.thumbnail_click("b", &mut router, t);
        assert_eq!(router.pushed, ["/en/gallery/a"]);
    }

    #[test]
    fn indicator_and_hint_follow_gestures() {
        let base = Instant::now();
        let mut v = mount("a", Rc::new(MemoryStore::default()), 1280.0, now_at(base, 0));
        let f = v.frame(now_at(base, 0));
        assert!(f.hint_visible);
        assert!(f.zoom_indicator.is_none());

        v.double_click(now_at(base, 10));
        let f = v.frame(now_at(base, 20));
        assert!(!f.hint_visible);
        assert_eq!(f.zoom_indicator, Some(2.0));

        v.double_click(now_at(base, 30));
        assert!(v.frame(now_at(base, 1000)).zoom_indicator.is_some());
        assert!(v.frame(now_at(base, 2030)).zoom_indicator.is_none());
    }

    #[test]
    fn desktop_preloads_both_neighbours_and_skips_cached_ones() {
        let fetcher = Arc::new(
            MemoryFetcher::default()
                .with("/img/a.jpg", png_bytes(4, 4))
                .with("/img/c.jpg", png_bytes(4, 4)),
        );
        let mut d = deps(Rc::new(MemoryStore::default()));
        d.cache = CacheHandle::new(ImageCache::new(u64::MAX), fetcher.clone(), Arc::new(|| {}));
        let t = now_at(Instant::now(), 0);
        let props = gallery().props_for("b", "en", false).unwrap();
        let mut v = PhotoViewer::new(props, d, 1280.0, t);

        assert!(wait_until(|| v.deps.cache.has("a") && v.deps.cache.has("c")));
        assert_eq!(requests_for(&fetcher, "/img/a.jpg"), 1);
        assert_eq!(requests_for(&fetcher, "/img/c.jpg"), 1);

        let before = fetcher.request_count();
        let mut router = RecordingRouter::default();
        assert!(v.key(ViewerKey::ArrowLeft, &mut router, t));
        assert!(v.key(ViewerKey::ArrowRight, &mut router, t));
        assert_eq!(fetcher.request_count(), before, "cached neighbours are not fetched again");
        assert_eq!(router.pushed, ["/en/gallery/a", "/en/gallery/c"]);
    }

    #[test]
    fn metadata_arrives_from_a_background_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.jpg");
        std::fs::write(&path, b"0123456789").unwrap();
        let props = Gallery::new(vec![ViewerImage::new("p", path.to_string_lossy())])
            .props_for("p", "en", false)
            .unwrap();
        let t = now_at(Instant::now(), 0);
        let mut v = PhotoViewer::new(props, deps(Rc::new(MemoryStore::default())), 1280.0, t);
        assert_eq!(v.metadata.file_name, "p.jpg");
        assert_eq!(v.metadata.file_size, None, "mounting does not touch the file");

        assert!(wait_until(|| {
            v.poll(t);
            v.metadata.file_size.is_some()
        }));
        assert_eq!(v.metadata.file_size, Some(10));
        assert!(v.frame(t).metadata.unwrap().contains(&"10 B".to_string()));
    }
}
