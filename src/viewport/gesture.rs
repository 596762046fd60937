//! Touch input and gesture notification types shared by the controller and
//! its host.

use std::time::Duration;

use crate::geometry::PointF;

/// What happened to the pointer set in a `TouchEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    /// First pointer went down.
    Down,
    /// One or more tracked pointers moved.
    Move,
    /// Last pointer went up.
    Up,
    /// An additional pointer went down while others are held.
    PointerDown,
    /// A pointer went up while others remain held.
    PointerUp,
    /// The host aborted the gesture.
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub id: u64,
    pub position: PointF,
}

/// One raw multi-touch report.
///
/// `pointers` is ordered by press order; index 0 is the primary pointer.
/// For `Up`/`PointerUp` the lifted pointer is still included.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub pointers: Vec<Pointer>,
    /// Monotonic timestamp supplied by the host.
    pub time: Duration,
}

impl TouchEvent {
    pub fn new(action: TouchAction, pointers: Vec<Pointer>, time: Duration) -> Self {
        Self {
            action,
            pointers,
            time,
        }
    }

    pub fn primary(&self) -> Option<PointF> {
        self.pointers.first().map(|p| p.position)
    }

    /// Distance between the first two pointers.
    pub fn span(&self) -> Option<f32> {
        match self.pointers.as_slice() {
            [a, b, ..] => Some(a.position.distance(b.position)),
            _ => None,
        }
    }

    /// Midpoint of the first two pointers.
    pub fn midpoint(&self) -> Option<PointF> {
        match self.pointers.as_slice() {
            [a, b, ..] => Some(a.position.midpoint(b.position)),
            _ => None,
        }
    }
}

/// Gesture state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TouchMode {
    #[default]
    None,
    Press,
    Drag,
    Zoom,
}

/// Notifications raised to the host while a gesture runs.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    /// A clean single tap, delivered once the double-tap window has passed.
    Tap,
    /// Second press inside the tap window while at the resting layout.
    DoubleTap(TouchEvent),
    /// One pinch step was applied.
    ScaleStep(TouchEvent),
    /// One drag step past the touch slop.
    DragStep(TouchEvent),
}

/// Side effects of feeding one `TouchEvent` to the controller that the
/// owner of cached decode state has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    /// A gesture finished and its settle step ran.
    pub settled: bool,
    /// Anything previously decoded for the old rectangle is now stale.
    pub invalidate_crop: bool,
}
