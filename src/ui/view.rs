//! Layout, hit-testing and drawing for the two screens: the viewer overlay
//! and the gallery index grid. All rectangles are in physical pixels; `ui`
//! is the window scale factor.

use crate::gallery::ViewerImage;
use crate::loader::DecodedImage;
use crate::progressive::LoadStatus;
use crate::ui::render::{Canvas, Color, Rect, fit_scale, text_width};
use crate::viewer::FrameState;

const TOOLBAR_H: f32 = 44.0;
const ASIDE_W: f32 = 280.0;
const STRIP_H: f32 = 76.0;
const THUMB: f32 = 56.0;
const THUMB_GAP: f32 = 6.0;
const ARROW: f32 = 44.0;
const MARGIN: f32 = 12.0;
const GRID_CELL: f32 = 180.0;
const GRID_LABEL_H: f32 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

pub struct Palette {
    pub bg: Color,
    pub stage: Color,
    pub panel: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub overlay: Color,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Dark => "Light",
            Theme::Light => "Dark",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                bg: (31, 31, 31, 255),
                stage: (12, 12, 12, 255),
                panel: (40, 40, 44, 255),
                text: (235, 235, 235, 255),
                muted: (150, 150, 150, 255),
                accent: (80, 160, 255, 255),
                overlay: (0, 0, 0, 160),
            },
            Theme::Light => Palette {
                bg: (242, 242, 242, 255),
                stage: (225, 225, 228, 255),
                panel: (255, 255, 255, 255),
                text: (20, 20, 20, 255),
                muted: (110, 110, 110, 255),
                accent: (20, 110, 220, 255),
                overlay: (255, 255, 255, 190),
            },
        }
    }
}

fn text_scale(ui: f32) -> u32 {
    ((2.0 * ui).round() as u32).max(1)
}

fn line_height(ui: f32) -> f32 {
    (7 * text_scale(ui)) as f32 + 6.0 * ui
}

// ---------------------------------------------------------------------------
// Viewer
// ---------------------------------------------------------------------------

/// What a press on the viewer screen landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Close,
    Theme,
    Prev,
    Next,
    Thumb(usize),
    Stage,
    Chrome,
}

#[derive(Debug, Clone, Default)]
pub struct ViewerLayout {
    pub toolbar: Rect,
    pub close: Rect,
    pub theme: Rect,
    pub stage: Rect,
    pub aside: Option<Rect>,
    pub strip: Option<Rect>,
    pub prev: Option<Rect>,
    pub next: Option<Rect>,
    pub thumbs: Vec<Rect>,
}

impl ViewerLayout {
    pub fn compute(w: f32, h: f32, ui: f32, frame: &FrameState) -> Self {
        let toolbar = Rect::new(0.0, 0.0, w, TOOLBAR_H * ui);
        let button = TOOLBAR_H * ui - 8.0 * ui;
        let close = Rect::new(w - button - 4.0 * ui, 4.0 * ui, button, button);
        let theme_w = text_width("Light", text_scale(ui)) + 16.0 * ui;
        let theme = Rect::new(close.x - theme_w - 8.0 * ui, 4.0 * ui, theme_w, button);

        let strip = (!frame.thumbnails.is_empty()).then(|| Rect::new(0.0, h - STRIP_H * ui, w, STRIP_H * ui));
        let bottom = strip.map(|s| s.y).unwrap_or(h);
        let aside = frame
            .metadata
            .is_some()
            .then(|| Rect::new(w - ASIDE_W * ui, toolbar.h, ASIDE_W * ui, bottom - toolbar.h));
        let right = aside.map(|a| a.x).unwrap_or(w);
        let stage = Rect::new(0.0, toolbar.h, right, bottom - toolbar.h);

        let arrow = ARROW * ui;
        let arrow_y = stage.y + (stage.h - arrow) / 2.0;
        let prev = frame.has_prev.then(|| Rect::new(stage.x + MARGIN * ui, arrow_y, arrow, arrow));
        let next = frame
            .has_next
            .then(|| Rect::new(stage.x + stage.w - MARGIN * ui - arrow, arrow_y, arrow, arrow));

        let thumbs = strip
            .map(|s| {
                let current = frame.thumbnails.iter().position(|t| t.current).unwrap_or(0);
                strip_cells(s, ui, frame.thumbnails.len(), current)
            })
            .unwrap_or_default();

        Self { toolbar, close, theme, stage, aside, strip, prev, next, thumbs }
    }

    pub fn hit(&self, p: (f32, f32)) -> Hit {
        if self.close.contains(p) {
            return Hit::Close;
        }
        if self.theme.contains(p) {
            return Hit::Theme;
        }
        if self.prev.is_some_and(|r| r.contains(p)) {
            return Hit::Prev;
        }
        if self.next.is_some_and(|r| r.contains(p)) {
            return Hit::Next;
        }
        if let Some(i) = self.thumbs.iter().position(|r| r.contains(p)) {
            return Hit::Thumb(i);
        }
        if self.stage.contains(p) {
            return Hit::Stage;
        }
        Hit::Chrome
    }
}

/// Cells for the thumbnail strip, scrolled so the current one is in view.
fn strip_cells(strip: Rect, ui: f32, count: usize, current: usize) -> Vec<Rect> {
    let cell = THUMB * ui;
    let pitch = cell + THUMB_GAP * ui;
    let total = count as f32 * pitch - THUMB_GAP * ui;
    let pad = MARGIN * ui;
    let start = if total + 2.0 * pad <= strip.w {
        strip.x + (strip.w - total) / 2.0
    } else {
        let centred = strip.x + strip.w / 2.0 - (current as f32 + 0.5) * pitch;
        centred.clamp(strip.x + strip.w - pad - total, strip.x + pad)
    };
    let y = strip.y + (strip.h - cell) / 2.0;
    (0..count).map(|i| Rect::new(start + i as f32 * pitch, y, cell, cell)).collect()
}

fn draw_image_in(canvas: &mut Canvas, img: &DecodedImage, stage: Rect, scale: f32, center: (f32, f32)) {
    let s = fit_scale(img.width as f32, img.height as f32, stage.w, stage.h) * scale;
    let (w, h) = (img.width as f32 * s, img.height as f32 * s);
    canvas.blit(img, center.0 - w / 2.0, center.1 - h / 2.0, s, stage);
}

fn centred_text(canvas: &mut Canvas, text: &str, center: (f32, f32), scale: u32, color: Color) {
    let w = text_width(text, scale);
    let h = (7 * scale) as f32;
    canvas.draw_text(text, (center.0 - w / 2.0) as i32, (center.1 - h / 2.0) as i32, scale, color);
}

fn pill(canvas: &mut Canvas, text: &str, center: (f32, f32), ui: f32, p: &Palette) {
    let scale = text_scale(ui);
    let w = text_width(text, scale) + 20.0 * ui;
    let h = line_height(ui) + 8.0 * ui;
    canvas.fill_rect(Rect::new(center.0 - w / 2.0, center.1 - h / 2.0, w, h), p.overlay);
    centred_text(canvas, text, center, scale, p.text);
}

pub fn draw_viewer(canvas: &mut Canvas, frame: &FrameState, layout: &ViewerLayout, ui: f32, theme: Theme) {
    let p = theme.palette();
    let scale = text_scale(ui);
    canvas.clear(p.bg);
    let stage = layout.stage;
    canvas.fill_rect(stage, p.stage);

    let (cx, cy) = stage.center();
    let mut incoming_shift = 0.0;
    if let Some(slide) = &frame.slide {
        incoming_shift = slide.offsets.incoming * stage.w;
        let at = (cx + slide.offsets.outgoing * stage.w, cy);
        match &slide.outgoing {
            Some(out) => draw_image_in(canvas, out, stage, 1.0, at),
            None => centred_text(canvas, &slide.outgoing_alt, at, scale, p.muted),
        }
    }

    match &frame.image {
        Some(img) => {
            let t = frame.transform;
            let center = (cx + t.offset.x * ui + incoming_shift, cy + t.offset.y * ui);
            draw_image_in(canvas, img, stage, t.scale, center);
        }
        None => {
            let msg = if frame.load_status == LoadStatus::Error || frame.error.is_some() {
                "Could not load image"
            } else {
                "Loading..."
            };
            centred_text(canvas, msg, (cx + incoming_shift, cy), scale, p.muted);
            if let Some(err) = &frame.error {
                let y = cy + line_height(ui) * 1.5;
                canvas.draw_text_clipped(err, (stage.x + MARGIN * ui) as i32, y as i32, scale, stage.w - 2.0 * MARGIN * ui, p.muted);
            }
        }
    }

    for (rect, glyph) in [(layout.prev, "<"), (layout.next, ">")] {
        if let Some(r) = rect {
            canvas.fill_rect(r, p.overlay);
            centred_text(canvas, glyph, r.center(), scale + 1, p.text);
        }
    }

    if let Some(z) = frame.zoom_indicator {
        pill(canvas, &format!("{:.0}%", z * 100.0), (cx, stage.y + 28.0 * ui), ui, &p);
    }
    if frame.hint_visible {
        let hint = if frame.mobile { "pinch to zoom, swipe to browse" } else { "wheel to zoom, double-click to reset" };
        pill(canvas, hint, (cx, stage.y + stage.h - 28.0 * ui), ui, &p);
    }
    if let Some((loaded, total)) = frame.progress {
        let bar = Rect::new(stage.x, stage.y, stage.w, 3.0 * ui);
        canvas.fill_rect(bar, p.overlay);
        let frac = match total {
            Some(t) if t > 0 => (loaded as f32 / t as f32).clamp(0.0, 1.0),
            _ => 0.0,
        };
        canvas.fill_rect(Rect::new(bar.x, bar.y, bar.w * frac, bar.h), p.accent);
        let label = match total {
            Some(t) if t > 0 => format!("{:.0}%", frac * 100.0),
            _ => format!("{} KB", loaded / 1024),
        };
        let lw = text_width(&label, scale);
        canvas.draw_text(&label, (stage.x + stage.w - lw - MARGIN * ui) as i32, (stage.y + 8.0 * ui) as i32, scale, p.muted);
    }

    // Toolbar
    canvas.fill_rect(layout.toolbar, p.panel);
    let ty = (layout.toolbar.h - (7 * scale) as f32) / 2.0;
    let title_max = layout.theme.x - 2.0 * MARGIN * ui;
    let mut title_end = MARGIN * ui + text_width(&frame.title, scale).min(title_max);
    canvas.draw_text_clipped(&frame.title, (MARGIN * ui) as i32, ty as i32, scale, title_max, p.text);
    if frame.live {
        title_end += 10.0 * ui;
        let badge = Rect::new(title_end, layout.toolbar.h / 2.0 - 10.0 * ui, text_width("LIVE", scale) + 10.0 * ui, 20.0 * ui);
        if badge.x + badge.w < layout.theme.x {
            canvas.stroke_rect(badge, ui.max(1.0), p.accent);
            centred_text(canvas, "LIVE", badge.center(), scale, p.accent);
        }
    }
    canvas.stroke_rect(layout.theme, ui.max(1.0), p.muted);
    centred_text(canvas, theme.label(), layout.theme.center(), scale, p.text);
    centred_text(canvas, "X", layout.close.center(), scale + 1, p.text);

    if let (Some(aside), Some(lines)) = (layout.aside, &frame.metadata) {
        canvas.fill_rect(aside, p.panel);
        let mut y = aside.y + MARGIN * ui;
        for (i, line) in lines.iter().enumerate() {
            let color = if i == 0 { p.text } else { p.muted };
            canvas.draw_text_clipped(line, (aside.x + MARGIN * ui) as i32, y as i32, scale, aside.w - 2.0 * MARGIN * ui, color);
            y += line_height(ui);
        }
    }

    if let Some(strip) = layout.strip {
        canvas.fill_rect(strip, p.panel);
        for (t, cell) in frame.thumbnails.iter().zip(&layout.thumbs) {
            let cell = cell.intersect(&strip);
            if cell.w <= 0.0 {
                continue;
            }
            canvas.fill_rect(cell, p.stage);
            if let Some(px) = &t.pixels {
                canvas.blit_fit(px, cell);
            }
            if t.current {
                canvas.stroke_rect(cell, 2.0 * ui, p.accent);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Gallery index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub area: Rect,
    pub columns: usize,
    pub cell: f32,
    pub row_h: f32,
    pub first_row: usize,
    pub rows_visible: usize,
}

impl GridLayout {
    /// Grid below the toolbar, scrolled so `selected` is visible.
    pub fn compute(w: f32, h: f32, ui: f32, count: usize, selected: usize, first_row: usize) -> Self {
        let area = Rect::new(0.0, TOOLBAR_H * ui, w, h - TOOLBAR_H * ui);
        let cell = GRID_CELL * ui;
        let columns = ((area.w / cell).floor() as usize).max(1);
        let row_h = cell + GRID_LABEL_H * ui;
        let rows_visible = ((area.h / row_h).floor() as usize).max(1);
        let rows = count.div_ceil(columns);
        let sel_row = selected / columns;
        let mut first = first_row.min(rows.saturating_sub(rows_visible));
        if sel_row < first {
            first = sel_row;
        } else if sel_row >= first + rows_visible {
            first = sel_row + 1 - rows_visible;
        }
        Self { area, columns, cell, row_h, first_row: first, rows_visible }
    }

    pub fn cell_rect(&self, index: usize) -> Option<Rect> {
        let row = index / self.columns;
        if row < self.first_row || row >= self.first_row + self.rows_visible {
            return None;
        }
        let col = index % self.columns;
        let x0 = self.area.x + (self.area.w - self.columns as f32 * self.cell) / 2.0;
        Some(Rect::new(
            x0 + col as f32 * self.cell,
            self.area.y + (row - self.first_row) as f32 * self.row_h,
            self.cell,
            self.row_h,
        ))
    }

    pub fn hit(&self, p: (f32, f32), count: usize) -> Option<usize> {
        let start = self.first_row * self.columns;
        let end = (start + self.rows_visible * self.columns).min(count);
        (start..end).find(|&i| self.cell_rect(i).is_some_and(|r| r.contains(p)))
    }
}

pub fn draw_index(
    canvas: &mut Canvas,
    grid: &GridLayout,
    images: &[ViewerImage],
    thumbs: &[Option<std::sync::Arc<DecodedImage>>],
    selected: usize,
    ui: f32,
    theme: Theme,
) {
    let p = theme.palette();
    let scale = text_scale(ui);
    canvas.clear(p.bg);

    let toolbar = Rect::new(0.0, 0.0, canvas.w as f32, TOOLBAR_H * ui);
    canvas.fill_rect(toolbar, p.panel);
    let ty = ((toolbar.h - (7 * scale) as f32) / 2.0) as i32;
    let title = format!("Gallery ({} photos)", images.len());
    canvas.draw_text(&title, (MARGIN * ui) as i32, ty, scale, p.text);

    if images.is_empty() {
        centred_text(canvas, "No photos", grid.area.center(), scale, p.muted);
        return;
    }

    for (i, img) in images.iter().enumerate() {
        let Some(cell) = grid.cell_rect(i) else { continue };
        let pad = 6.0 * ui;
        let frame = Rect::new(cell.x + pad, cell.y + pad, cell.w - 2.0 * pad, grid.cell - 2.0 * pad);
        canvas.fill_rect(frame, p.stage);
        if let Some(Some(px)) = thumbs.get(i) {
            canvas.blit_fit(px, frame);
        }
        if img.is_live_photo {
            canvas.draw_text("LIVE", (frame.x + 4.0 * ui) as i32, (frame.y + 4.0 * ui) as i32, scale, p.accent);
        }
        if i == selected {
            canvas.stroke_rect(frame, 3.0 * ui, p.accent);
        }
        let label_y = frame.y + frame.h + 4.0 * ui;
        canvas.draw_text_clipped(img.alt_text(), frame.x as i32, label_y as i32, scale, frame.w, p.muted);
    }
}
