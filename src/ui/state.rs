use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::keyboard::{Key, NamedKey};

use crate::gallery::{Direction, Gallery, History, Route, Router, gallery_path, image_path};
use crate::loader::{DecodedImage, lock_state};
use crate::ui::render::Canvas;
use crate::ui::view::{GridLayout, Hit, Theme, ViewerLayout, draw_index, draw_viewer};
use crate::viewer::{Now, PhotoViewer, ViewerDeps, ViewerKey};
use crate::zoom::Size;

const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);
const DOUBLE_CLICK_SLOP: f32 = 6.0;
/// Frame interval while something animates.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Pairs presses into double clicks; winit reports single presses only.
#[derive(Debug, Default)]
pub struct ClickTracker {
    last: Option<(Instant, (f32, f32))>,
}

impl ClickTracker {
    /// Returns true when this press completes a double click.
    pub fn press(&mut self, at: Instant, pos: (f32, f32)) -> bool {
        if let Some((t, p)) = self.last {
            let close = (pos.0 - p.0).abs() <= DOUBLE_CLICK_SLOP && (pos.1 - p.1).abs() <= DOUBLE_CLICK_SLOP;
            if close && at.saturating_duration_since(t) <= DOUBLE_CLICK_WINDOW {
                self.last = None;
                return true;
            }
        }
        self.last = Some((at, pos));
        false
    }
}

pub enum Screen {
    Index,
    Viewer(Box<PhotoViewer>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Handled,
    ToggleFullscreen,
    Quit,
}

pub struct AppState {
    gallery: Gallery,
    deps: ViewerDeps,
    history: History,
    pub screen: Screen,
    pub theme: Theme,
    selected: usize,
    first_row: usize,

    clicks: ClickTracker,
    cursor: (f32, f32),
    mouse_down: bool,
    scale_factor: f32,
    fb_size: (u32, u32),
    layout: ViewerLayout,
    grid: Option<GridLayout>,
    /// Another frame is needed even without input, e.g. after a resize.
    dirty: bool,
}

impl AppState {
    pub fn new(gallery: Gallery, deps: ViewerDeps) -> Self {
        Self {
            gallery,
            deps,
            history: History::default(),
            screen: Screen::Index,
            theme: Theme::Dark,
            selected: 0,
            first_row: 0,
            clicks: ClickTracker::default(),
            cursor: (0.0, 0.0),
            mouse_down: false,
            scale_factor: 1.0,
            fb_size: (1, 1),
            layout: ViewerLayout::default(),
            grid: None,
            dirty: true,
        }
    }

    fn locale(&self) -> &str {
        &self.deps.config.locale
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn viewer(&self) -> Option<&PhotoViewer> {
        match &self.screen {
            Screen::Viewer(v) => Some(v),
            Screen::Index => None,
        }
    }

    fn logical_width(&self) -> f32 {
        self.fb_size.0 as f32 / self.scale_factor
    }

    fn to_logical(&self, p: (f32, f32)) -> (f32, f32) {
        (p.0 / self.scale_factor, p.1 / self.scale_factor)
    }

    pub fn set_surface(&mut self, width: u32, height: u32, scale_factor: f64) {
        self.fb_size = (width.max(1), height.max(1));
        self.scale_factor = (scale_factor as f32).max(0.1);
        let w = self.logical_width();
        if let Screen::Viewer(v) = &mut self.screen {
            v.set_viewport(w);
        }
        self.dirty = true;
    }

    pub fn window_title(&self) -> String {
        match &self.screen {
            Screen::Viewer(v) => format!("gv - {}", v.props().image.alt_text()),
            Screen::Index => "gv".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Go to `path` as if a link had been followed.
    pub fn navigate_to(&mut self, path: String, now: Now) {
        self.history.push(path);
        self.apply_route(now);
    }

    /// Act on the latest route pushed since the last call.
    pub fn apply_route(&mut self, now: Now) {
        let Some(path) = self.history.take_pending() else { return };
        match Route::parse(&path) {
            Some(Route::Image { locale, id }) => {
                let with_thumbs = self.deps.config.show_thumbnails;
                let Some(props) = self.gallery.props_for(&id, &locale, with_thumbs) else {
                    log::warn!("No image with id {}", id);
                    return;
                };
                if let Some(pos) = self.gallery.position(&id) {
                    self.selected = pos;
                }
                if let Screen::Viewer(v) = &mut self.screen {
                    v.set_props(props, now);
                } else {
                    let viewer = PhotoViewer::new(props, self.deps.clone(), self.logical_width(), now);
                    self.screen = Screen::Viewer(Box::new(viewer));
                }
            }
            Some(Route::Index { .. }) => {
                log::debug!("Back to the index");
                self.screen = Screen::Index;
                self.mouse_down = false;
            }
            None => log::warn!("Ignoring unknown route {}", path),
        }
        self.dirty = true;
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub fn key(&mut self, key: &Key, now: Now) -> KeyOutcome {
        let ch = match key {
            Key::Character(s) => s.chars().next(),
            _ => None,
        };
        match ch {
            Some('t') | Some('T') => {
                self.theme = self.theme.toggled();
                return KeyOutcome::Handled;
            }
            Some('f') | Some('F') => return KeyOutcome::ToggleFullscreen,
            Some('q') | Some('Q') => return KeyOutcome::Quit,
            _ => {}
        }

        let outcome = match &mut self.screen {
            Screen::Viewer(v) => {
                let vk = match key {
                    Key::Named(NamedKey::Escape) => ViewerKey::Escape,
                    Key::Named(NamedKey::ArrowLeft) => ViewerKey::ArrowLeft,
                    Key::Named(NamedKey::ArrowRight) => ViewerKey::ArrowRight,
                    _ => ViewerKey::Other,
                };
                if v.key(vk, &mut self.history, now) {
                    KeyOutcome::Handled
                } else {
                    KeyOutcome::Ignored
                }
            }
            Screen::Index => self.index_key(key),
        };
        self.apply_route(now);
        outcome
    }

    fn index_key(&mut self, key: &Key) -> KeyOutcome {
        let count = self.gallery.len();
        let columns = self.grid.map(|g| g.columns).unwrap_or(1);
        let step = |sel: usize, d: i64| (sel as i64 + d).clamp(0, count.saturating_sub(1) as i64) as usize;
        let Key::Named(named) = key else { return KeyOutcome::Ignored };
        match named {
            NamedKey::Escape => return KeyOutcome::Quit,
            NamedKey::ArrowLeft => self.selected = step(self.selected, -1),
            NamedKey::ArrowRight => self.selected = step(self.selected, 1),
            NamedKey::ArrowUp => self.selected = step(self.selected, -(columns as i64)),
            NamedKey::ArrowDown => self.selected = step(self.selected, columns as i64),
            NamedKey::Home => self.selected = 0,
            NamedKey::End => self.selected = count.saturating_sub(1),
            NamedKey::Enter => {
                if let Some(img) = self.gallery.images().get(self.selected) {
                    let path = image_path(self.locale(), &img.id);
                    self.history.push(path);
                }
            }
            _ => return KeyOutcome::Ignored,
        }
        KeyOutcome::Handled
    }

    pub fn cursor_moved(&mut self, pos: (f32, f32)) {
        self.cursor = pos;
        if !self.mouse_down {
            return;
        }
        let logical = self.to_logical(pos);
        if let Screen::Viewer(v) = &mut self.screen {
            v.pointer_move(logical);
        }
    }

    pub fn mouse_press(&mut self, now: Now) {
        let pos = self.cursor;
        let double = self.clicks.press(now.instant, pos);
        match self.screen {
            Screen::Index => {
                if let Some(i) = self.grid.and_then(|g| g.hit(pos, self.gallery.len())) {
                    self.selected = i;
                    let path = image_path(self.locale(), &self.gallery.images()[i].id);
                    self.history.push(path);
                }
            }
            Screen::Viewer(_) => match self.layout.hit(pos) {
                Hit::Stage if double => {
                    if let Screen::Viewer(v) = &mut self.screen {
                        v.double_click(now);
                    }
                }
                Hit::Stage => {
                    self.mouse_down = true;
                    let logical = self.to_logical(pos);
                    if let Screen::Viewer(v) = &mut self.screen {
                        v.pointer_down(logical);
                    }
                }
                hit => self.chrome_press(hit, now),
            },
        }
        self.apply_route(now);
    }

    fn chrome_press(&mut self, hit: Hit, now: Now) {
        let Screen::Viewer(v) = &mut self.screen else { return };
        match hit {
            Hit::Close => self.history.push(gallery_path(&self.deps.config.locale)),
            Hit::Theme => self.theme = self.theme.toggled(),
            Hit::Prev => {
                v.navigate(Direction::Prev, &mut self.history, now);
            }
            Hit::Next => {
                v.navigate(Direction::Next, &mut self.history, now);
            }
            Hit::Thumb(i) => {
                let id = v.props().thumbnails.as_ref().and_then(|t| t.get(i)).map(|t| t.id.clone());
                if let Some(id) = id {
                    v.thumbnail_click(&id, &mut self.history, now);
                }
            }
            Hit::Stage | Hit::Chrome => {}
        }
    }

    pub fn mouse_release(&mut self, now: Now) {
        if !std::mem::take(&mut self.mouse_down) {
            return;
        }
        if let Screen::Viewer(v) = &mut self.screen {
            v.pointer_up(&mut self.history, now);
        }
        self.apply_route(now);
    }

    /// `delta_y` follows the DOM convention: negative scrolls up and zooms in.
    pub fn wheel(&mut self, delta_y: f32, now: Now) {
        match &mut self.screen {
            Screen::Viewer(v) => {
                if self.layout.stage.contains(self.cursor) {
                    v.wheel(delta_y, now);
                }
            }
            Screen::Index => {
                let columns = self.grid.map(|g| g.columns).unwrap_or(1) as i64;
                let rows = if delta_y > 0.0 { 1 } else { -1 };
                let last = self.gallery.len().saturating_sub(1) as i64;
                self.selected = (self.selected as i64 + rows * columns).clamp(0, last.max(0)) as usize;
            }
        }
    }

    pub fn touch_start(&mut self, id: u64, pos: (f32, f32), now: Now) {
        match self.screen {
            Screen::Index => {
                self.cursor = pos;
                self.mouse_press(now);
            }
            Screen::Viewer(_) => match self.layout.hit(pos) {
                Hit::Stage => {
                    let logical = self.to_logical(pos);
                    if let Screen::Viewer(v) = &mut self.screen {
                        v.touch_start(id, logical);
                    }
                }
                hit => {
                    self.chrome_press(hit, now);
                    self.apply_route(now);
                }
            },
        }
    }

    pub fn touch_move(&mut self, id: u64, pos: (f32, f32), now: Now) {
        let logical = self.to_logical(pos);
        if let Screen::Viewer(v) = &mut self.screen {
            v.touch_move(id, logical, now);
        }
    }

    pub fn touch_end(&mut self, id: u64, now: Now) {
        if let Screen::Viewer(v) = &mut self.screen {
            v.touch_end(id, &mut self.history, now);
        }
        self.apply_route(now);
    }

    pub fn touch_cancel(&mut self, now: Now) {
        if let Screen::Viewer(v) = &mut self.screen {
            v.touch_cancel(now);
        }
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Earliest moment the next frame is due, if any.
    pub fn next_frame(&self, now: Instant) -> Option<Instant> {
        if self.dirty {
            return Some(now);
        }
        match &self.screen {
            Screen::Viewer(v) if v.is_animating() => Some(now + FRAME_INTERVAL),
            Screen::Viewer(v) => v.next_deadline(),
            Screen::Index => None,
        }
    }

    fn index_thumbnails(&self) -> Vec<Option<Arc<DecodedImage>>> {
        let Some(grid) = self.grid else { return Vec::new() };
        let (_, cvar) = &*self.deps.sources;
        let mut sources = lock_state(&self.deps.sources);
        let thumbs = self
            .gallery
            .images()
            .iter()
            .enumerate()
            .map(|(i, img)| {
                grid.cell_rect(i)?;
                let path = img.small_thumb_path.as_deref().unwrap_or(img.preview_path());
                let px = sources.get_thumbnail(path);
                if px.is_none() {
                    sources.request_thumbnail(path);
                }
                px
            })
            .collect();
        cvar.notify_all();
        thumbs
    }

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    pub fn render(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32, now: Now) {
        self.dirty = false;
        let ui = self.scale_factor;
        let (w, h) = (fb_w as f32, fb_h as f32);
        let mut canvas = Canvas { buf: frame, w: fb_w, h: fb_h };

        if let Screen::Viewer(v) = &mut self.screen {
            let state = v.frame(now);
            let layout = ViewerLayout::compute(w, h, ui, &state);
            let container = Size::new(layout.stage.w / ui, layout.stage.h / ui);
            if v.set_container(container) {
                self.dirty = true;
            }
            draw_viewer(&mut canvas, &state, &layout, ui, self.theme);
            self.layout = layout;
            return;
        }

        let grid = GridLayout::compute(w, h, ui, self.gallery.len(), self.selected, self.first_row);
        self.first_row = grid.first_row;
        self.grid = Some(grid);
        let thumbs = self.index_thumbnails();
        draw_index(&mut canvas, &grid, self.gallery.images(), &thumbs, self.selected, ui, self.theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheHandle, ImageCache};
    use crate::config::ViewerConfig;
    use crate::fetch::testing::MemoryFetcher;
    use crate::gallery::ViewerImage;
    use crate::loader::CacheState;
    use crate::session::testing::MemoryStore;
    use std::rc::Rc;
    use std::sync::{Condvar, Mutex};

    fn app() -> AppState {
        let gallery = Gallery::new(vec![
            ViewerImage::new("a", "/img/a.jpg"),
            ViewerImage::new("b", "/img/b.jpg"),
            ViewerImage::new("c", "/img/c.jpg"),
        ]);
        let deps = ViewerDeps {
            cache: CacheHandle::new(ImageCache::new(u64::MAX), Arc::new(MemoryFetcher::default()), Arc::new(|| {})),
            sources: Arc::new((Mutex::new(CacheState::new(u64::MAX)), Condvar::new())),
            session: Rc::new(MemoryStore::default()),
            config: ViewerConfig::default(),
        };
        let mut app = AppState::new(gallery, deps);
        app.set_surface(1280, 800, 1.0);
        app
    }

    fn named(k: NamedKey) -> Key {
        Key::Named(k)
    }

    fn viewer_id(app: &AppState) -> Option<String> {
        app.viewer().map(|v| v.props().image.id.clone())
    }

    #[test]
    fn double_click_needs_time_and_distance() {
        let t0 = Instant::now();
        let mut c = ClickTracker::default();
        assert!(!c.press(t0, (10.0, 10.0)));
        assert!(c.press(t0 + Duration::from_millis(300), (14.0, 12.0)));
        assert!(!c.press(t0 + Duration::from_millis(350), (14.0, 12.0)), "a third press starts over");
        assert!(!c.press(t0 + Duration::from_millis(900), (14.0, 12.0)));
        assert!(!c.press(t0 + Duration::from_millis(950), (40.0, 12.0)));
    }

    #[test]
    fn enter_opens_and_escape_returns() {
        let now = Now::capture();
        let mut app = app();
        assert_eq!(app.key(&named(NamedKey::ArrowRight), now), KeyOutcome::Handled);
        assert_eq!(app.key(&named(NamedKey::Enter), now), KeyOutcome::Handled);
        assert_eq!(viewer_id(&app).as_deref(), Some("b"));

        app.key(&named(NamedKey::ArrowRight), now);
        assert_eq!(viewer_id(&app).as_deref(), Some("c"), "same mount follows the route");
        assert_eq!(app.selected(), 2);

        app.key(&named(NamedKey::Escape), now);
        assert!(app.viewer().is_none());
        assert_eq!(app.key(&named(NamedKey::Escape), now), KeyOutcome::Quit);
    }

    #[test]
    fn unknown_routes_leave_the_screen_alone() {
        let now = Now::capture();
        let mut app = app();
        app.navigate_to(image_path("en", "zz"), now);
        assert!(app.viewer().is_none());
        app.navigate_to("/nowhere".into(), now);
        assert!(app.viewer().is_none());
        app.navigate_to(image_path("en", "a"), now);
        assert_eq!(viewer_id(&app).as_deref(), Some("a"));
    }

    #[test]
    fn global_keys() {
        let now = Now::capture();
        let mut app = app();
        assert_eq!(app.key(&Key::Character("t".into()), now), KeyOutcome::Handled);
        assert_eq!(app.theme, Theme::Light);
        assert_eq!(app.key(&Key::Character("f".into()), now), KeyOutcome::ToggleFullscreen);
        assert_eq!(app.key(&Key::Character("q".into()), now), KeyOutcome::Quit);
        app.navigate_to(image_path("en", "a"), now);
        assert_eq!(app.key(&Key::Character("x".into()), now), KeyOutcome::Ignored);
    }

    #[test]
    fn render_fills_layout_for_hit_testing() {
        let now = Now::capture();
        let mut app = app();
        app.navigate_to(image_path("en", "b"), now);
        let mut buf = vec![0u32; 1280 * 800];
        app.render(&mut buf, 1280, 800, now);
        assert!(app.layout.prev.is_some() && app.layout.next.is_some());

        app.cursor_moved(app.layout.next.unwrap().center());
        app.mouse_press(now);
        assert_eq!(viewer_id(&app).as_deref(), Some("c"));

        app.render(&mut buf, 1280, 800, now);
        app.cursor_moved(app.layout.close.center());
        app.mouse_press(now);
        assert!(app.viewer().is_none());
    }
}
