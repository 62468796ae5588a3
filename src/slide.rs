//! Slide animation between neighbouring photos.
//!
//! The outgoing photo is remembered just before navigating, both in memory and
//! in a session slot, so whichever viewer shows the next photo can slide it out.

use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::gallery::Direction;
use crate::session::SessionStore;

pub const SLIDE_SLOT: &str = "gallery-slide-direction";
pub const HINT_TTL_MS: i64 = 1500;
const SLIDE_WINDOW: Duration = Duration::from_millis(320);
const SLIDE_EASE: Duration = Duration::from_millis(300);

/// Wire form of the session slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationIntent {
    pub direction: Direction,
    pub ts: i64,
    pub from_src: String,
    pub from_alt: String,
    pub from_id: String,
}

impl NavigationIntent {
    fn is_fresh(&self, now_ms: i64) -> bool {
        let age = now_ms - self.ts;
        (0..=HINT_TTL_MS).contains(&age)
    }
}

/// The photo being navigated away from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub src: String,
    pub alt: String,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideDirection {
    Left,
    Right,
}

impl From<Direction> for SlideDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Next => SlideDirection::Left,
            Direction::Prev => SlideDirection::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidePhase {
    Pre,
    Animating,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlideContext {
    pub direction: SlideDirection,
    pub from_src: String,
    pub from_alt: String,
    pub phase: SlidePhase,
    created: Instant,
    animating_since: Option<Instant>,
}

/// Horizontal positions as fractions of the container width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideOffsets {
    pub outgoing: f32,
    pub incoming: f32,
}

pub struct SlideEngine {
    store: Rc<dyn SessionStore>,
    context: Option<SlideContext>,
    pending: Option<NavigationIntent>,
}

impl SlideEngine {
    pub fn new(store: Rc<dyn SessionStore>) -> Self {
        Self { store, context: None, pending: None }
    }

    pub fn context(&self) -> Option<&SlideContext> {
        self.context.as_ref()
    }

    /// Remember the outgoing photo for whichever viewer shows the next one.
    pub fn mark_pending_direction(&mut self, direction: Direction, outgoing: Snapshot, now_ms: i64) {
        let intent = NavigationIntent {
            direction,
            ts: now_ms,
            from_src: outgoing.src,
            from_alt: outgoing.alt,
            from_id: outgoing.id,
        };
        match serde_json::to_string(&intent) {
            Ok(json) => {
                if let Err(e) = self.store.set(SLIDE_SLOT, &json) {
                    log::debug!("[slide] session slot unavailable: {}", e);
                }
            }
            Err(e) => log::debug!("[slide] could not encode intent: {}", e),
        }
        self.pending = Some(intent);
    }

    pub fn clear_stored_direction(&mut self) {
        if let Err(e) = self.store.remove(SLIDE_SLOT) {
            log::debug!("[slide] could not clear session slot: {}", e);
        }
    }

    /// Read and consume the slot. Any failure means there is no hint.
    fn take_stored(&mut self) -> Option<NavigationIntent> {
        let raw = match self.store.get(SLIDE_SLOT) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("[slide] session slot unavailable: {}", e);
                return None;
            }
        };
        self.clear_stored_direction();
        let raw = raw?;
        match serde_json::from_str::<NavigationIntent>(&raw) {
            Ok(intent) => Some(intent),
            Err(e) => {
                log::debug!("[slide] ignoring malformed hint: {}", e);
                None
            }
        }
    }

    /// Called on mount and whenever the displayed image id changes.
    pub fn on_identity(&mut self, image_id: &str, now_ms: i64, now: Instant) {
        let stored = self.take_stored();
        let in_memory = self.pending.take();

        let chosen = in_memory
            .filter(|i| i.from_id != image_id && i.is_fresh(now_ms))
            .or_else(|| stored.filter(|i| i.from_id != image_id && i.is_fresh(now_ms)));

        self.context = chosen.map(|intent| {
            log::debug!("[slide] {:?} from {}", intent.direction, intent.from_id);
            SlideContext {
                direction: intent.direction.into(),
                from_src: intent.from_src,
                from_alt: intent.from_alt,
                phase: SlidePhase::Pre,
                created: now,
                animating_since: None,
            }
        });
    }

    /// One frame tick: `Pre` becomes `Animating`; expired transitions are dropped.
    pub fn advance(&mut self, now: Instant) {
        let Some(ctx) = self.context.as_mut() else { return };
        if now.saturating_duration_since(ctx.created) >= SLIDE_WINDOW {
            self.context = None;
            return;
        }
        if ctx.phase == SlidePhase::Pre {
            ctx.phase = SlidePhase::Animating;
            ctx.animating_since = Some(now);
        }
    }

    pub fn offsets(&self, now: Instant) -> Option<SlideOffsets> {
        let ctx = self.context.as_ref()?;
        let sign = match ctx.direction {
            SlideDirection::Left => -1.0,
            SlideDirection::Right => 1.0,
        };
        let t = match (ctx.phase, ctx.animating_since) {
            (SlidePhase::Animating, Some(since)) => {
                let t = now.saturating_duration_since(since).as_secs_f32() / SLIDE_EASE.as_secs_f32();
                let t = t.clamp(0.0, 1.0);
                1.0 - (1.0 - t).powi(3)
            }
            _ => 0.0,
        };
        Some(SlideOffsets {
            outgoing: sign * t,
            incoming: -sign * (1.0 - t),
        })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.context.as_ref().map(|c| c.created + SLIDE_WINDOW)
    }
}
