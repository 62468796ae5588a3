//! Single-pointer drag interpretation: pan when zoomed, swipe when not.

use std::time::{Duration, Instant};

use crate::gallery::Direction;
use crate::zoom::{Offset, ZoomEngine};

/// Horizontal movement needed before an unzoomed drag starts following the pointer.
const SWIPE_ENGAGE_PX: f32 = 10.0;
/// Rubber-band damping applied to the unzoomed drag offset.
const SWIPE_DAMPING: f32 = 0.3;
const SETTLE_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeThresholds {
    pub mouse: f32,
    pub touch: f32,
}

impl Default for SwipeThresholds {
    fn default() -> Self {
        Self { mouse: 100.0, touch: 80.0 }
    }
}

impl SwipeThresholds {
    pub fn for_kind(&self, kind: PointerKind) -> f32 {
        match kind {
            PointerKind::Mouse => self.mouse,
            PointerKind::Touch => self.touch,
        }
    }
}

/// Which neighbours exist for the current image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Available {
    pub prev: bool,
    pub next: bool,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    kind: PointerKind,
    start: (f32, f32),
    last: (f32, f32),
    origin: Offset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragRelease {
    /// Nothing was being dragged.
    Ignored,
    /// Zoomed pan finished; the offset stays where it is.
    Panned,
    /// Unzoomed drag: the offset animates back to the centre from `from`.
    SnapBack { from: Offset },
    /// Unzoomed drag past the threshold with a neighbour in that direction.
    Swipe { direction: Direction, from: Offset },
}

#[derive(Debug, Default)]
pub struct DragEngine {
    press: Option<Press>,
    pinching: bool,
    thresholds: SwipeThresholds,
}

impl DragEngine {
    pub fn new(thresholds: SwipeThresholds) -> Self {
        Self { press: None, pinching: false, thresholds }
    }

    pub fn is_pinching(&self) -> bool {
        self.pinching
    }

    pub fn press(&mut self, kind: PointerKind, pos: (f32, f32), offset: Offset) {
        if self.pinching {
            return;
        }
        self.press = Some(Press { kind, start: pos, last: pos, origin: offset });
    }

    /// A second finger landed: drop any single-finger drag and suppress
    /// swipes until every finger has lifted.
    pub fn begin_pinch(&mut self) {
        self.pinching = true;
        self.press = None;
    }

    pub fn end_pinch(&mut self) {
        self.pinching = false;
    }

    pub fn cancel(&mut self) {
        self.press = None;
    }

    /// Returns the offset the image should show now, if the move changed it.
    pub fn drag_move(&mut self, pos: (f32, f32), zoom: &ZoomEngine) -> Option<Offset> {
        if self.pinching {
            return None;
        }
        let press = self.press.as_mut()?;
        press.last = pos;
        let dx = pos.0 - press.start.0;
        let dy = pos.1 - press.start.1;

        if zoom.is_zoomed() {
            let next = Offset::new(press.origin.x + dx, press.origin.y + dy);
            return Some(zoom.clamp_offset(next, zoom.scale()));
        }

        if dx.abs() > dy.abs() && dx.abs() > SWIPE_ENGAGE_PX {
            return Some(Offset::new(SWIPE_DAMPING * dx, 0.0));
        }
        None
    }

    pub fn release(&mut self, zoom: &ZoomEngine, available: Available) -> DragRelease {
        let Some(press) = self.press.take() else {
            return DragRelease::Ignored;
        };
        if self.pinching {
            return DragRelease::Ignored;
        }
        if zoom.is_zoomed() {
            return DragRelease::Panned;
        }

        let from = zoom.offset();
        let dx = press.last.0 - press.start.0;
        if dx.abs() > self.thresholds.for_kind(press.kind) {
            let direction = if dx < 0.0 { Direction::Next } else { Direction::Prev };
            let exists = match direction {
                Direction::Next => available.next,
                Direction::Prev => available.prev,
            };
            if exists {
                return DragRelease::Swipe { direction, from };
            }
        }
        DragRelease::SnapBack { from }
    }
}

/// Eased return of the displayed offset to the centre after an unzoomed drag.
#[derive(Debug, Clone, Copy)]
pub struct SettleAnimation {
    from: Offset,
    started: Instant,
}

impl SettleAnimation {
    pub fn new(from: Offset, started: Instant) -> Self {
        Self { from, started }
    }

    pub fn offset_at(&self, now: Instant) -> Offset {
        let t = now.saturating_duration_since(self.started).as_secs_f32() / SETTLE_DURATION.as_secs_f32();
        let t = t.clamp(0.0, 1.0);
        let eased = 1.0 - (1.0 - t).powi(3);
        self.from.lerp(Offset::ZERO, eased)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= SETTLE_DURATION
    }

    pub fn deadline(&self) -> Instant {
        self.started + SETTLE_DURATION
    }
}
