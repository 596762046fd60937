//! Touch-driven viewport controller.
//!
//! Owns where the bitmap projects onto the surface (`display`), the resting
//! fit-to-width layout (`idle`) and the per-gesture baseline (`last`).
//! Every gesture step is computed from `last` plus a delta, never
//! accumulated frame over frame.

use std::time::Duration;

use tracing::{debug, trace};

use crate::config::GestureConfig;
use crate::geometry::{PointF, RectF};

use super::gesture::{GestureEvent, Outcome, TouchAction, TouchEvent, TouchMode};
use super::tap_timer::TapTimer;

#[derive(Debug)]
pub struct ViewportController {
    config: GestureConfig,
    display: RectF,
    last: RectF,
    idle: RectF,
    bitmap_size: Option<(u32, u32)>,
    surface_size: Option<(f32, f32)>,
    mode: TouchMode,
    press_origin: PointF,
    pivot: PointF,
    start_span: f32,
    tap_timer: TapTimer,
    double_tap: bool,
    single_tap: bool,
    needs_redraw: bool,
    events: Option<flume::Sender<GestureEvent>>,
}

impl ViewportController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            display: RectF::default(),
            last: RectF::default(),
            idle: RectF::default(),
            bitmap_size: None,
            surface_size: None,
            mode: TouchMode::None,
            press_origin: PointF::default(),
            pivot: PointF::default(),
            start_span: 0.0,
            tap_timer: TapTimer::default(),
            double_tap: false,
            single_tap: false,
            needs_redraw: false,
            events: None,
        }
    }

    /// Open a fresh notification channel. Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> flume::Receiver<GestureEvent> {
        let (tx, rx) = flume::unbounded();
        self.events = Some(tx);
        rx
    }

    /// Install the size of a new bitmap, or `None` to keep the current one.
    ///
    /// Resets every rectangle and re-arms the measurement latch so the next
    /// `measure` lays the new bitmap out from scratch.
    pub fn set_bitmap_size(&mut self, size: Option<(u32, u32)>) -> bool {
        let Some((w, h)) = size.filter(|(w, h)| *w > 0 && *h > 0) else {
            return false;
        };
        self.bitmap_size = Some((w, h));
        self.surface_size = None;
        self.display = RectF::default();
        self.last = RectF::default();
        self.idle = RectF::default();
        self.needs_redraw = true;
        true
    }

    pub fn has_bitmap(&self) -> bool {
        self.bitmap_size.is_some()
    }

    pub fn is_measured(&self) -> bool {
        self.surface_size.is_some()
    }

    /// Latch the surface size on first draw and compute the idle layout.
    /// Later calls are ignored until a new bitmap is installed.
    pub fn measure(&mut self, width: f32, height: f32) -> bool {
        if self.surface_size.is_some() || self.bitmap_size.is_none() {
            return false;
        }
        if !(width > 0.0 && height > 0.0) {
            return false;
        }
        self.surface_size = Some((width, height));
        self.fit_width();
        self.idle = self.display;
        debug!(idle = ?self.idle, width, height, "Measured surface");
        true
    }

    pub fn display_rect(&self) -> RectF {
        self.display
    }

    pub fn idle_rect(&self) -> RectF {
        self.idle
    }

    pub fn mode(&self) -> TouchMode {
        self.mode
    }

    /// The visible window, i.e. the surface bounds.
    pub fn surface_rect(&self) -> Option<RectF> {
        self.surface_size.map(|(w, h)| RectF::from_size(w, h))
    }

    /// When the host should next call `poll_tap`.
    pub fn tap_deadline(&self) -> Option<Duration> {
        self.tap_timer.deadline()
    }

    /// Whether a redraw was requested since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// At the resting layout: every edge equals the idle rectangle.
    pub fn is_idle(&self) -> bool {
        self.bitmap_size.is_some() && self.surface_size.is_some() && self.display == self.idle
    }

    /// Fit entirely inside the surface (smaller scale factor), centered.
    pub fn fit_width(&mut self) {
        self.fit(f32::min);
    }

    /// Fill the surface (larger scale factor), centered.
    pub fn fit_height(&mut self) {
        self.fit(f32::max);
    }

    fn fit(&mut self, pick: fn(f32, f32) -> f32) {
        let (Some((bw, bh)), Some((sw, sh))) = (self.bitmap_size, self.surface_size) else {
            return;
        };
        let natural = RectF::from_size(bw as f32, bh as f32);
        self.last = natural;
        let scale = pick(sw / natural.width(), sh / natural.height());
        self.set_display(natural.scale(scale));
        self.center(true, true);
    }

    /// Split the leftover space on each requested axis evenly.
    pub fn center(&mut self, horizontal: bool, vertical: bool) {
        let Some((sw, sh)) = self.surface_size else {
            return;
        };
        self.last = self.display;
        let dx = if horizontal {
            ((0.0 - self.last.left) + (sw - self.last.right)) / 2.0
        } else {
            0.0
        };
        let dy = if vertical {
            ((0.0 - self.last.top) + (sh - self.last.bottom)) / 2.0
        } else {
            0.0
        };
        self.set_display(self.last.translate(dx, dy));
    }

    /// Dragging only moves the image while some edge is off-surface.
    pub fn is_draggable(&self) -> bool {
        let Some((sw, sh)) = self.surface_size else {
            return false;
        };
        let d = &self.display;
        d.top < 0.0 || d.left < 0.0 || d.right > sw || d.bottom > sh
    }

    /// Deliver an overdue single tap. Returns `true` when the timer fired.
    pub fn poll_tap(&mut self, now: Duration) -> bool {
        if !self.tap_timer.poll(now) {
            return false;
        }
        if !self.single_tap {
            self.emit(GestureEvent::Tap);
        }
        true
    }

    pub fn handle_event(&mut self, event: &TouchEvent) -> Outcome {
        // A tap whose window elapsed before this event is delivered first.
        self.poll_tap(event.time);

        let mut outcome = Outcome::default();
        match event.action {
            TouchAction::Down => outcome = self.on_down(event),
            TouchAction::PointerDown => outcome = self.on_pointer_down(event),
            TouchAction::Up => {
                if self.mode == TouchMode::Press {
                    if std::mem::take(&mut self.double_tap) {
                        debug!("Double tap released");
                    }
                    self.single_tap = false;
                } else {
                    self.settle_position();
                    outcome.settled = true;
                }
                self.set_mode(TouchMode::None);
            }
            TouchAction::PointerUp => {
                if self.mode == TouchMode::Zoom {
                    self.settle_zoom();
                    outcome.settled = true;
                }
                self.set_mode(TouchMode::None);
            }
            TouchAction::Move => outcome = self.on_move(event),
            TouchAction::Cancel => {
                self.double_tap = false;
                self.single_tap = false;
                self.tap_timer.cancel();
                self.set_mode(TouchMode::None);
            }
        }
        outcome
    }

    fn on_down(&mut self, event: &TouchEvent) -> Outcome {
        let mut outcome = Outcome::default();
        self.single_tap = true;
        let had_pending_tap = self.tap_timer.is_pending(event.time);
        self.tap_timer.cancel();

        if had_pending_tap && self.is_idle() {
            self.double_tap = true;
            self.fit_height();
            debug!(display = ?self.display, "Double tap, fit height");
            self.emit(GestureEvent::DoubleTap(event.clone()));
            outcome.settled = true;
            outcome.invalidate_crop = true;
        } else {
            self.tap_timer.arm(event.time, self.config.tap_timeout);
        }

        self.last = self.display;
        self.press_origin = event.primary().unwrap_or_default();
        self.set_mode(TouchMode::Press);
        outcome
    }

    fn on_pointer_down(&mut self, event: &TouchEvent) -> Outcome {
        let mut outcome = Outcome::default();
        let (Some(span), Some(mid)) = (event.span(), event.midpoint()) else {
            return outcome;
        };
        self.start_span = span;
        if span > self.config.touch_slop {
            self.last = self.display;
            self.pivot = mid;
            self.set_mode(TouchMode::Zoom);
            outcome.invalidate_crop = true;
        }
        outcome
    }

    fn on_move(&mut self, event: &TouchEvent) -> Outcome {
        let mut outcome = Outcome::default();
        match self.mode {
            TouchMode::Press | TouchMode::Drag => {
                let Some(pos) = event.primary() else {
                    return outcome;
                };
                let dx = pos.x - self.press_origin.x;
                let dy = pos.y - self.press_origin.y;
                if (dx * dx + dy * dy).sqrt() > self.config.touch_slop {
                    self.set_mode(TouchMode::Drag);
                    if self.is_draggable() {
                        self.set_display(self.last.translate(dx, dy));
                        trace!(dx, dy, "Drag step");
                    }
                    outcome.invalidate_crop = true;
                    self.emit(GestureEvent::DragStep(event.clone()));
                }
            }
            TouchMode::Zoom => {
                let Some(span) = event.span() else {
                    return outcome;
                };
                if span > self.config.touch_slop && self.start_span > 0.0 {
                    let factor = span / self.start_span;
                    self.set_display(self.last.scale_about(self.pivot, factor, factor));
                    trace!(factor, "Zoom step");
                    self.emit(GestureEvent::ScaleStep(event.clone()));
                }
            }
            TouchMode::None => {}
        }
        outcome
    }

    /// Snap back to idle below the minimum scale; pull back to exactly the
    /// maximum scale about the pinch pivot above it.
    fn settle_zoom(&mut self) {
        self.last = self.display;
        if self.mode != TouchMode::Zoom || self.idle.is_empty() {
            return;
        }

        let scale_x = self.display.width() / self.idle.width();
        let scale_y = self.display.height() / self.idle.height();
        let (min, max) = (self.config.min_scale, self.config.max_scale);

        if scale_x < min || scale_y < min {
            debug!(scale_x, scale_y, "Zoom below minimum, reset to idle");
            self.set_display(self.idle);
        } else if scale_x > max || scale_y > max {
            debug!(scale_x, scale_y, "Zoom above maximum, clamping");
            let fx = max / scale_x;
            let fy = max / scale_y;
            self.set_display(self.last.scale_about(self.pivot, fx, fy));
        } else {
            self.needs_redraw = true;
        }
    }

    /// Per axis: when both edges sit on the same side of the surface, shift
    /// by whichever edge needs the shorter trip back onto its boundary.
    fn settle_position(&mut self) {
        self.last = self.display;
        let Some((sw, sh)) = self.surface_size else {
            return;
        };
        let r = self.last;

        let mut dx = 0.0;
        if (r.left < 0.0 && r.right < sw) || (r.left > 0.0 && r.right > sw) {
            let to_left = 0.0 - r.left;
            let to_right = sw - r.right;
            dx = if to_left.abs() < to_right.abs() {
                to_left
            } else {
                to_right
            };
        }

        let mut dy = 0.0;
        if (r.top < 0.0 && r.bottom < sh) || (r.top > 0.0 && r.bottom > sh) {
            let to_top = 0.0 - r.top;
            let to_bottom = sh - r.bottom;
            dy = if to_top.abs() < to_bottom.abs() {
                to_top
            } else {
                to_bottom
            };
        }

        if dx != 0.0 || dy != 0.0 {
            debug!(dx, dy, "Correcting position");
        }
        self.set_display(r.translate(dx, dy));
    }

    fn set_display(&mut self, rect: RectF) {
        self.display = rect;
        self.needs_redraw = true;
    }

    fn set_mode(&mut self, mode: TouchMode) {
        if self.mode != mode {
            trace!(from = ?self.mode, to = ?mode, "Touch mode");
            self.mode = mode;
        }
    }

    fn emit(&mut self, event: GestureEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                self.events = None;
            }
        }
    }
}
