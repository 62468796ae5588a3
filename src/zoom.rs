//! Zoom and pan state for the displayed photo.
//!
//! Scale lives in `[MIN_SCALE, MAX_SCALE]` and the pan offset is always kept
//! inside the bounds computed by [`clamp_offset`], so the scaled image never
//! uncovers more of the container than it has to.

use std::time::{Duration, Instant};

pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 4.0;
pub const WHEEL_STEP: f32 = 1.1;
pub const DOUBLE_CLICK_SCALE: f32 = 2.0;

const INDICATOR_HIDE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Offset, t: f32) -> Offset {
        Offset {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }

    fn is_usable(&self) -> bool {
        self.w.is_finite() && self.h.is_finite() && self.w > 0.0 && self.h > 0.0
    }
}

/// Largest rectangle with the image's aspect ratio that fits the container.
pub fn fit_size(container: Size, natural: Size) -> Size {
    let s = (container.w / natural.w).min(container.h / natural.h);
    Size::new(natural.w * s, natural.h * s)
}

/// Clamp a requested pan offset so the scaled image stays over the container.
///
/// Returns `{0,0}` when either size is unknown or degenerate.
pub fn clamp_offset(next: Offset, scale: f32, container: Option<Size>, natural: Option<Size>) -> Offset {
    let (Some(container), Some(natural)) = (container, natural) else {
        return Offset::ZERO;
    };
    if !container.is_usable() || !natural.is_usable() || !scale.is_finite() {
        return Offset::ZERO;
    }

    let base = fit_size(container, natural);
    let max_x = ((base.w * scale - container.w) / 2.0).max(0.0);
    let max_y = ((base.h * scale - container.h) / 2.0).max(0.0);

    let x = if next.x.is_finite() { next.x.clamp(-max_x, max_x) } else { 0.0 };
    let y = if next.y.is_finite() { next.y.clamp(-max_y, max_y) } else { 0.0 };
    Offset { x, y }
}

pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        MIN_SCALE
    }
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    start_distance: f32,
    start_scale: f32,
}

#[derive(Debug)]
pub struct ZoomEngine {
    scale: f32,
    offset: Offset,
    container: Option<Size>,
    natural: Option<Size>,
    pinch: Option<Pinch>,

    indicator_visible: bool,
    indicator_hide_at: Option<Instant>,
    hint_visible: bool,
}

impl Default for ZoomEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoomEngine {
    pub fn new() -> Self {
        Self {
            scale: MIN_SCALE,
            offset: Offset::ZERO,
            container: None,
            natural: None,
            pinch: None,
            indicator_visible: false,
            indicator_hide_at: None,
            hint_visible: true,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn is_zoomed(&self) -> bool {
        self.scale > MIN_SCALE
    }

    pub fn container(&self) -> Option<Size> {
        self.container
    }

    pub fn natural(&self) -> Option<Size> {
        self.natural
    }

    pub fn indicator_visible(&self) -> bool {
        self.indicator_visible
    }

    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }

    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    pub fn clamp_offset(&self, next: Offset, scale: f32) -> Offset {
        clamp_offset(next, scale, self.container, self.natural)
    }

    /// Back to scale 1, centred, natural size forgotten, hint shown again.
    pub fn reset(&mut self) {
        self.scale = MIN_SCALE;
        self.offset = Offset::ZERO;
        self.natural = None;
        self.pinch = None;
        self.indicator_visible = false;
        self.indicator_hide_at = None;
        self.hint_visible = true;
    }

    pub fn set_container(&mut self, size: Size) {
        self.container = Some(size);
        self.offset = self.clamp_offset(self.offset, self.scale);
    }

    pub fn set_natural(&mut self, size: Size) {
        self.natural = Some(size);
        self.offset = self.clamp_offset(self.offset, self.scale);
    }

    /// Stores an already computed offset. Callers that pan pass it through
    /// `clamp_offset` first; the swipe rubber band at scale 1 does not.
    pub fn set_offset(&mut self, offset: Offset) {
        self.offset = offset;
    }

    pub fn dismiss_hint(&mut self) {
        self.hint_visible = false;
    }

    pub fn wheel(&mut self, delta_y: f32, now: Instant) {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let factor = if delta_y < 0.0 { WHEEL_STEP } else { 1.0 / WHEEL_STEP };
        self.apply_scale(self.scale * factor, now);
    }

    pub fn double_click(&mut self, now: Instant) {
        let next = if self.scale > MIN_SCALE { MIN_SCALE } else { DOUBLE_CLICK_SCALE };
        self.apply_scale(next, now);
    }

    pub fn pinch_start(&mut self, distance: f32) {
        self.pinch = Some(Pinch {
            start_distance: distance.max(1.0),
            start_scale: self.scale,
        });
        self.hint_visible = false;
    }

    pub fn pinch_move(&mut self, distance: f32, now: Instant) {
        let Some(pinch) = self.pinch else { return };
        self.apply_scale(pinch.start_scale * (distance / pinch.start_distance), now);
    }

    pub fn pinch_end(&mut self) {
        self.pinch = None;
    }

    fn apply_scale(&mut self, requested: f32, now: Instant) {
        let scale = clamp_scale(requested);
        let changed = scale != self.scale;
        self.scale = scale;
        self.offset = self.clamp_offset(self.offset, scale);
        self.hint_visible = false;
        if changed {
            self.indicator_visible = true;
            self.indicator_hide_at = (scale == MIN_SCALE).then(|| now + INDICATOR_HIDE_DELAY);
        }
    }

    /// Timer poll: hides the indicator once its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if let Some(at) = self.indicator_hide_at {
            if now >= at && self.scale == MIN_SCALE {
                self.indicator_visible = false;
                self.indicator_hide_at = None;
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.indicator_hide_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_1000x800_with_4_3() -> ZoomEngine {
        let mut z = ZoomEngine::new();
        z.set_container(Size::new(1000.0, 800.0));
        z.set_natural(Size::new(4000.0, 3000.0));
        z
    }

    #[test]
    fn clamp_without_geometry_is_zero() {
        let o = clamp_offset(Offset::new(50.0, -20.0), 2.0, None, Some(Size::new(10.0, 10.0)));
        assert_eq!(o, Offset::ZERO);
        let o = clamp_offset(Offset::new(50.0, -20.0), 2.0, Some(Size::new(0.0, 10.0)), Some(Size::new(10.0, 10.0)));
        assert_eq!(o, Offset::ZERO);
    }

    #[test]
    fn clamp_keeps_visible_rect_inside_container() {
        let container = Size::new(1000.0, 800.0);
        let naturals = [Size::new(4000.0, 3000.0), Size::new(500.0, 2000.0), Size::new(100.0, 100.0)];
        for natural in naturals {
            for step in 0..=12 {
                let scale = 1.0 + step as f32 * 0.25;
                let o = clamp_offset(Offset::new(1e6, -1e6), scale, Some(container), Some(natural));
                let base = fit_size(container, natural);
                let (w, h) = (base.w * scale, base.h * scale);
                if w >= container.w {
                    assert!(o.x - w / 2.0 <= -container.w / 2.0 + 0.01);
                    assert!(o.x + w / 2.0 >= container.w / 2.0 - 0.01);
                } else {
                    assert_eq!(o.x, 0.0);
                }
                if h >= container.h {
                    assert!(o.y + h / 2.0 >= container.h / 2.0 - 0.01);
                } else {
                    assert_eq!(o.y, 0.0);
                }
            }
        }
    }

    #[test]
    fn clamp_uses_letterboxed_base_rect() {
        // 4:3 into 1000x800 fits as 1000x750; at 2x that is 2000x1500.
        let o = clamp_offset(Offset::new(900.0, 900.0), 2.0, Some(Size::new(1000.0, 800.0)), Some(Size::new(4000.0, 3000.0)));
        assert_eq!(o, Offset::new(500.0, 350.0));
    }

    #[test]
    fn clamp_rejects_non_finite_input() {
        let o = clamp_offset(Offset::new(f32::NAN, f32::INFINITY), 2.0, Some(Size::new(100.0, 100.0)), Some(Size::new(100.0, 100.0)));
        assert_eq!(o, Offset::ZERO);
    }

    #[test]
    fn wheel_stays_within_bounds() {
        let now = Instant::now();
        let mut z = engine_1000x800_with_4_3();
        for _ in 0..50 {
            z.wheel(-1.0, now);
        }
        assert_eq!(z.scale(), MAX_SCALE);
        for _ in 0..50 {
            z.wheel(1.0, now);
        }
        assert_eq!(z.scale(), MIN_SCALE);
        assert_eq!(z.offset(), Offset::ZERO);
    }

    #[test]
    fn wheel_out_reclamps_offset() {
        let now = Instant::now();
        let mut z = engine_1000x800_with_4_3();
        z.double_click(now);
        z.set_offset(z.clamp_offset(Offset::new(500.0, 350.0), z.scale()));
        z.wheel(1.0, now);
        let max_x = (1000.0 * z.scale() - 1000.0) / 2.0;
        assert!(z.offset().x <= max_x + 0.001);
    }

    #[test]
    fn double_click_toggles_between_one_and_two() {
        let now = Instant::now();
        let mut z = engine_1000x800_with_4_3();
        z.double_click(now);
        assert_eq!(z.scale(), 2.0);
        z.set_offset(z.clamp_offset(Offset::new(120.0, 40.0), 2.0));
        z.double_click(now);
        assert_eq!(z.scale(), 1.0);
        assert_eq!(z.offset(), Offset::ZERO);
    }

    #[test]
    fn pinch_scales_by_finger_distance_ratio() {
        let now = Instant::now();
        let mut z = engine_1000x800_with_4_3();
        z.pinch_start(100.0);
        z.pinch_move(250.0, now);
        assert!((z.scale() - 2.5).abs() < 1e-5);
        z.pinch_move(1000.0, now);
        assert_eq!(z.scale(), MAX_SCALE);
        z.pinch_move(10.0, now);
        assert_eq!(z.scale(), MIN_SCALE);
        z.pinch_end();
        assert!(!z.is_pinching());
    }

    #[test]
    fn indicator_hides_two_seconds_after_returning_to_one() {
        let t0 = Instant::now();
        let mut z = engine_1000x800_with_4_3();
        assert!(!z.indicator_visible());
        z.double_click(t0);
        assert!(z.indicator_visible());
        z.tick(t0 + Duration::from_secs(10));
        assert!(z.indicator_visible(), "stays while zoomed");

        let t1 = t0 + Duration::from_secs(11);
        z.double_click(t1);
        z.tick(t1 + Duration::from_millis(1999));
        assert!(z.indicator_visible());
        z.tick(t1 + Duration::from_secs(2));
        assert!(!z.indicator_visible());
    }

    #[test]
    fn hint_hidden_after_first_gesture_and_back_on_reset() {
        let mut z = engine_1000x800_with_4_3();
        assert!(z.hint_visible());
        z.wheel(-1.0, Instant::now());
        assert!(!z.hint_visible());
        z.reset();
        assert!(z.hint_visible());
        assert_eq!(z.scale(), 1.0);
        assert_eq!(z.offset(), Offset::ZERO);
        assert!(z.natural().is_none());
    }
}
