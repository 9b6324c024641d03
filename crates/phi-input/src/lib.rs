// Pointer input: gesture classification, note matching, autoplay scripts

pub mod autoplay;
pub mod play_field;
pub mod pointer;

pub use autoplay::{autoplay_script, play_script};
pub use play_field::{HitEvent, HitOutcome, MatcherConfig, PlayField};
pub use pointer::{
    Gesture, GestureThresholds, KEYBOARD_POINTER, Pointer, PointerChange, PointerEvent, PointerId,
    PointerTracker, TimedPointerEvent,
};
