//! Folds per-pointer reports from a toolkit into ordered multi-touch events.
//!
//! Toolkits such as GTK report each touch sequence (or the mouse) on its
//! own. The controller instead expects one event stream carrying every held
//! pointer, where the first press is `Down`, later presses are
//! `PointerDown`, and so on.

use std::time::Duration;

use crate::geometry::PointF;

use super::gesture::{Pointer, TouchAction, TouchEvent};

#[derive(Debug, Default)]
pub struct PointerTracker {
    active: Vec<Pointer>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn press(&mut self, id: u64, position: PointF, time: Duration) -> TouchEvent {
        if let Some(p) = self.active.iter_mut().find(|p| p.id == id) {
            // Duplicate press for a held pointer; treat as motion.
            p.position = position;
            return self.snapshot(TouchAction::Move, time);
        }
        self.active.push(Pointer { id, position });
        let action = if self.active.len() == 1 {
            TouchAction::Down
        } else {
            TouchAction::PointerDown
        };
        self.snapshot(action, time)
    }

    pub fn motion(&mut self, id: u64, position: PointF, time: Duration) -> Option<TouchEvent> {
        let p = self.active.iter_mut().find(|p| p.id == id)?;
        p.position = position;
        Some(self.snapshot(TouchAction::Move, time))
    }

    pub fn release(&mut self, id: u64, position: PointF, time: Duration) -> Option<TouchEvent> {
        let index = self.active.iter().position(|p| p.id == id)?;
        self.active[index].position = position;
        let action = if self.active.len() == 1 {
            TouchAction::Up
        } else {
            TouchAction::PointerUp
        };
        let event = self.snapshot(action, time);
        self.active.remove(index);
        Some(event)
    }

    /// Abort everything held. Returns `None` when nothing was held.
    pub fn cancel(&mut self, time: Duration) -> Option<TouchEvent> {
        if self.active.is_empty() {
            return None;
        }
        let event = self.snapshot(TouchAction::Cancel, time);
        self.active.clear();
        Some(event)
    }

    fn snapshot(&self, action: TouchAction, time: Duration) -> TouchEvent {
        TouchEvent::new(action, self.active.clone(), time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::ZERO;

    #[test]
    fn test_two_finger_sequence() {
        let mut tracker = PointerTracker::new();

        let e = tracker.press(7, PointF::new(10.0, 10.0), T);
        assert_eq!(e.action, TouchAction::Down);

        let e = tracker.press(9, PointF::new(50.0, 10.0), T);
        assert_eq!(e.action, TouchAction::PointerDown);
        assert_eq!(e.pointers.len(), 2);
        assert_eq!(e.pointers[0].id, 7);

        let e = tracker.motion(9, PointF::new(80.0, 10.0), T).unwrap();
        assert_eq!(e.action, TouchAction::Move);
        assert_eq!(e.span(), Some(70.0));

        let e = tracker.release(7, PointF::new(10.0, 10.0), T).unwrap();
        assert_eq!(e.action, TouchAction::PointerUp);
        assert_eq!(e.pointers.len(), 2);
        assert_eq!(tracker.active_count(), 1);

        let e = tracker.release(9, PointF::new(80.0, 10.0), T).unwrap();
        assert_eq!(e.action, TouchAction::Up);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn test_unknown_pointer_is_ignored() {
        let mut tracker = PointerTracker::new();
        assert!(tracker.motion(1, PointF::default(), T).is_none());
        assert!(tracker.release(1, PointF::default(), T).is_none());
        assert!(tracker.cancel(T).is_none());
    }

    #[test]
    fn test_cancel_clears_all() {
        let mut tracker = PointerTracker::new();
        tracker.press(1, PointF::default(), T);
        tracker.press(2, PointF::new(30.0, 0.0), T);
        let e = tracker.cancel(T).unwrap();
        assert_eq!(e.action, TouchAction::Cancel);
        assert_eq!(tracker.active_count(), 0);
    }
}
