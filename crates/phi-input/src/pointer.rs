//! Pointer tracking and gesture classification.
//!
//! Each pointer is tracked independently from press to release. A release
//! classifies the press as a tap, a flick or nothing; a flick can also fire
//! while the pointer is still down, at most once per press.

use std::collections::BTreeMap;

use phi_model::Viewport;
use serde::{Deserialize, Serialize};

pub type PointerId = u64;

/// Pointer id used for keyboard presses.
pub const KEYBOARD_POINTER: PointerId = u64::MAX;

/// Shortest interval between samples used for speed, in seconds.
const MIN_VELOCITY_WINDOW: f64 = 1e-3;
/// Longest interval between samples used for speed. A longer gap counts as
/// resting until this long before the move.
const MAX_VELOCITY_WINDOW: f64 = 0.1;

/// Raw input from a touch screen, mouse or keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PointerEvent {
    /// Press. Keyboard presses have no position.
    Down {
        id: PointerId,
        position: Option<(f64, f64)>,
    },
    Move {
        id: PointerId,
        position: (f64, f64),
    },
    Up {
        id: PointerId,
    },
    /// Release every pointer without producing gestures (focus loss).
    CancelAll,
}

/// A pointer event stamped with its playback time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPointerEvent {
    pub time: f64,
    pub event: PointerEvent,
}

impl TimedPointerEvent {
    pub fn new(time: f64, event: PointerEvent) -> Self {
        Self { time, event }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gesture {
    Tap,
    Flick,
}

/// Gesture thresholds in pixels and seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureThresholds {
    pub tap_max_duration: f64,
    /// Displacement that makes a press a flick
    pub flick_distance: f64,
    /// Minimum flick speed in px/s
    pub flick_velocity: f64,
}

impl GestureThresholds {
    /// Thresholds scaled by the viewport's shorter side.
    pub fn for_viewport(
        viewport: Viewport,
        flick_ratio: f64,
        flick_velocity_ratio: f64,
        tap_max_duration: f64,
    ) -> Self {
        let base = viewport.width.min(viewport.height);
        Self {
            tap_max_duration,
            flick_distance: flick_ratio * base,
            flick_velocity: flick_velocity_ratio * base,
        }
    }
}

/// State of one pressed pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub down_time: f64,
    pub start: Option<(f64, f64)>,
    pub position: Option<(f64, f64)>,
    /// Largest distance from the press position so far
    pub max_displacement: f64,
    /// Speed of the latest move in px/s
    pub speed: f64,
    /// Time of the latest sample
    pub sampled_at: f64,
    /// A flick already fired during this press
    pub flicked: bool,
}

impl Pointer {
    fn is_flick(&self, thresholds: &GestureThresholds) -> bool {
        self.max_displacement >= thresholds.flick_distance && self.speed >= thresholds.flick_velocity
    }

    fn sample(&mut self, t: f64, position: (f64, f64)) {
        if let Some((px, py)) = self.position {
            let dt = (t - self.sampled_at).clamp(MIN_VELOCITY_WINDOW, MAX_VELOCITY_WINDOW);
            self.speed = (position.0 - px).hypot(position.1 - py) / dt;
        }
        if let Some((sx, sy)) = self.start {
            let d = (position.0 - sx).hypot(position.1 - sy);
            self.max_displacement = self.max_displacement.max(d);
        }
        self.position = Some(position);
        self.sampled_at = t;
    }

    /// Position to search from for flicks: where the press started.
    pub fn flick_origin(&self) -> Option<(f64, f64)> {
        self.start.or(self.position)
    }
}

/// What applying one [`PointerEvent`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerChange {
    Pressed(Pointer),
    /// Flick threshold crossed while still down
    Flicked(Pointer),
    Released {
        pointer: Pointer,
        gesture: Option<Gesture>,
    },
}

/// Live pointers keyed by id.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    thresholds: GestureThresholds,
    pointers: BTreeMap<PointerId, Pointer>,
}

impl PointerTracker {
    pub fn new(thresholds: GestureThresholds) -> Self {
        Self {
            thresholds,
            pointers: BTreeMap::new(),
        }
    }

    pub fn thresholds(&self) -> &GestureThresholds {
        &self.thresholds
    }

    pub fn is_down(&self, id: PointerId) -> bool {
        self.pointers.contains_key(&id)
    }

    /// Pointers currently pressed, in id order.
    pub fn pointers(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.values()
    }

    pub fn apply(&mut self, t: f64, event: PointerEvent) -> Vec<PointerChange> {
        match event {
            PointerEvent::Down { id, position } => {
                let mut changes = Vec::new();
                if let Some(previous) = self.pointers.remove(&id) {
                    log::debug!("pointer {id} pressed again without release");
                    changes.push(PointerChange::Released {
                        pointer: previous,
                        gesture: None,
                    });
                }
                let pointer = Pointer {
                    id,
                    down_time: t,
                    start: position,
                    position,
                    max_displacement: 0.0,
                    speed: 0.0,
                    sampled_at: t,
                    flicked: false,
                };
                self.pointers.insert(id, pointer.clone());
                changes.push(PointerChange::Pressed(pointer));
                changes
            }
            PointerEvent::Move { id, position } => {
                let Some(pointer) = self.pointers.get_mut(&id) else {
                    return Vec::new();
                };
                pointer.sample(t, position);
                if !pointer.flicked && pointer.is_flick(&self.thresholds) {
                    pointer.flicked = true;
                    return vec![PointerChange::Flicked(pointer.clone())];
                }
                Vec::new()
            }
            PointerEvent::Up { id } => match self.pointers.remove(&id) {
                Some(pointer) => {
                    let gesture = self.classify_release(&pointer, t);
                    vec![PointerChange::Released { pointer, gesture }]
                }
                None => Vec::new(),
            },
            PointerEvent::CancelAll => std::mem::take(&mut self.pointers)
                .into_values()
                .map(|pointer| PointerChange::Released {
                    pointer,
                    gesture: None,
                })
                .collect(),
        }
    }

    fn classify_release(&self, pointer: &Pointer, t: f64) -> Option<Gesture> {
        if pointer.flicked {
            return None;
        }
        if pointer.is_flick(&self.thresholds) {
            return Some(Gesture::Flick);
        }
        let duration = t - pointer.down_time;
        if duration <= self.thresholds.tap_max_duration
            && pointer.max_displacement < self.thresholds.flick_distance
        {
            return Some(Gesture::Tap);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PointerTracker {
        // 1280x720: flick distance 14.4 px, velocity 72 px/s
        PointerTracker::new(GestureThresholds::for_viewport(
            Viewport::new(1280.0, 720.0),
            0.02,
            0.1,
            0.5,
        ))
    }

    fn down(id: PointerId, x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down {
            id,
            position: Some((x, y)),
        }
    }

    fn released_gesture(changes: &[PointerChange]) -> Option<Gesture> {
        match changes {
            [PointerChange::Released { gesture, .. }] => *gesture,
            other => panic!("unexpected changes: {other:?}"),
        }
    }

    #[test]
    fn short_still_press_is_a_tap() {
        let mut t = tracker();
        t.apply(0.0, down(1, 100.0, 100.0));
        t.apply(0.1, PointerEvent::Move { id: 1, position: (105.0, 100.0) });
        let changes = t.apply(0.2, PointerEvent::Up { id: 1 });
        assert_eq!(released_gesture(&changes), Some(Gesture::Tap));
        assert!(!t.is_down(1));
    }

    #[test]
    fn long_press_is_nothing() {
        let mut t = tracker();
        t.apply(0.0, down(1, 100.0, 100.0));
        let changes = t.apply(0.8, PointerEvent::Up { id: 1 });
        assert_eq!(released_gesture(&changes), None);
    }

    #[test]
    fn flick_fires_mid_press_once() {
        let mut t = tracker();
        t.apply(0.0, down(1, 100.0, 100.0));
        let changes = t.apply(0.05, PointerEvent::Move { id: 1, position: (100.0, 130.0) });
        match changes.as_slice() {
            [PointerChange::Flicked(p)] => assert_eq!(p.flick_origin(), Some((100.0, 100.0))),
            other => panic!("unexpected changes: {other:?}"),
        }
        assert!(t.apply(0.06, PointerEvent::Move { id: 1, position: (100.0, 160.0) }).is_empty());
        let changes = t.apply(0.07, PointerEvent::Up { id: 1 });
        assert_eq!(released_gesture(&changes), None);
    }

    #[test]
    fn slow_drag_is_not_a_flick() {
        let mut t = tracker();
        t.apply(0.0, down(1, 100.0, 100.0));
        // 2 px every 0.1 s is 20 px/s, below 72 px/s.
        for step in 1..=10 {
            let y = 100.0 + 2.0 * step as f64;
            let changes = t.apply(0.1 * step as f64, PointerEvent::Move { id: 1, position: (100.0, y) });
            assert!(changes.is_empty());
        }
        let changes = t.apply(1.05, PointerEvent::Up { id: 1 });
        assert_eq!(released_gesture(&changes), None);
    }

    #[test]
    fn swipe_after_resting_is_a_flick() {
        let mut t = tracker();
        t.apply(0.0, down(1, 100.0, 100.0));
        let changes = t.apply(1.0, PointerEvent::Move { id: 1, position: (100.0, 160.0) });
        assert!(matches!(changes.as_slice(), [PointerChange::Flicked(_)]));
        let changes = t.apply(1.02, PointerEvent::Up { id: 1 });
        assert_eq!(released_gesture(&changes), None);
    }

    #[test]
    fn keyboard_pointer_taps_without_position() {
        let mut t = tracker();
        t.apply(0.0, PointerEvent::Down { id: KEYBOARD_POINTER, position: None });
        let changes = t.apply(0.1, PointerEvent::Up { id: KEYBOARD_POINTER });
        assert_eq!(released_gesture(&changes), Some(Gesture::Tap));
    }

    #[test]
    fn cancel_all_releases_without_gestures() {
        let mut t = tracker();
        t.apply(0.0, down(2, 0.0, 0.0));
        t.apply(0.0, down(1, 0.0, 0.0));
        let changes = t.apply(0.1, PointerEvent::CancelAll);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, PointerChange::Released { gesture: None, .. })));
        assert_eq!(t.pointers().count(), 0);
    }

    #[test]
    fn pointers_are_independent() {
        let mut t = tracker();
        t.apply(0.0, down(1, 0.0, 0.0));
        t.apply(0.0, down(2, 500.0, 0.0));
        t.apply(0.1, PointerEvent::Up { id: 1 });
        assert!(t.is_down(2));
        assert!(t.apply(0.2, PointerEvent::Up { id: 1 }).is_empty());
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_string(&PointerEvent::Up { id: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"up","id":3}"#);
    }
}
