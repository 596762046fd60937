//! Viewport gesture handling.
//!
//! - `ViewportController` - display rectangle state machine and settle rules
//! - `PointerTracker` - turns per-pointer toolkit reports into `TouchEvent`s
//! - `TapTimer` - cancelable single/double tap window

pub mod controller;
pub mod gesture;
pub mod pointers;
pub mod tap_timer;

pub use controller::ViewportController;
pub use gesture::{GestureEvent, Outcome, Pointer, TouchAction, TouchEvent, TouchMode};
pub use pointers::PointerTracker;
