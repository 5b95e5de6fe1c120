//! Gesture events
//!
//! Platform input layers report raw pointer events; [`MoveGestureDetector`]
//! turns them into [`GestureEvent::Pan`] deltas that a scene can apply.
//! Pinch recognition is left to the platform, which reports
//! [`GestureEvent::Zoom`] directly.

use bigview_render::PointF;

/// High-level navigation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Drag by `(dx, dy)` buffer pixels
    Pan { dx: f32, dy: f32 },
    /// Scale by `factor` around `focus`, in buffer pixels
    Zoom { factor: f32, focus: PointF },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// One input sample with the positions of all active pointers
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub pointers: Vec<PointF>,
}

impl PointerEvent {
    pub fn new(action: PointerAction, pointers: Vec<PointF>) -> Self {
        Self { action, pointers }
    }

    /// Centroid of the active pointers
    pub fn focal_point(&self) -> Option<PointF> {
        if self.pointers.is_empty() {
            return None;
        }
        let count = self.pointers.len() as f32;
        let (x, y) = self
            .pointers
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        Some(PointF::new(x / count, y / count))
    }
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    focus: PointF,
    pointers: usize,
}

/// Centroid-delta drag detector
///
/// Each move reports how far the pointer centroid travelled since the
/// previous event. When a finger is added or lifted mid-drag the centroid
/// jumps, so that one move reports a zero delta.
///
/// # Example
///
/// ```
/// use bigview_core::{GestureEvent, MoveGestureDetector, PointerAction, PointerEvent};
/// use bigview_render::PointF;
///
/// let mut detector = MoveGestureDetector::new();
/// detector.on_event(&PointerEvent::new(PointerAction::Down, vec![PointF::new(10.0, 10.0)]));
/// let pan = detector.on_event(&PointerEvent::new(PointerAction::Move, vec![PointF::new(25.0, 5.0)]));
/// assert_eq!(pan, Some(GestureEvent::Pan { dx: 15.0, dy: -5.0 }));
/// ```
#[derive(Debug, Default)]
pub struct MoveGestureDetector {
    anchor: Option<Anchor>,
    in_progress: bool,
}

impl MoveGestureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a drag has produced at least one move
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn reset(&mut self) {
        self.anchor = None;
        self.in_progress = false;
    }

    /// Feed one pointer event; returns a pan for every tracked move
    pub fn on_event(&mut self, event: &PointerEvent) -> Option<GestureEvent> {
        match event.action {
            PointerAction::Down => {
                self.reset();
                self.anchor = Self::anchor(event);
                None
            }
            PointerAction::Move => {
                let current = Self::anchor(event)?;
                let Some(previous) = self.anchor.replace(current) else {
                    return None;
                };
                self.in_progress = true;

                if previous.pointers != current.pointers {
                    return Some(GestureEvent::Pan { dx: 0.0, dy: 0.0 });
                }
                Some(GestureEvent::Pan {
                    dx: current.focus.x - previous.focus.x,
                    dy: current.focus.y - previous.focus.y,
                })
            }
            PointerAction::Up | PointerAction::Cancel => {
                if self.in_progress {
                    tracing::trace!("move gesture ended");
                }
                self.reset();
                None
            }
        }
    }

    fn anchor(event: &PointerEvent) -> Option<Anchor> {
        event.focal_point().map(|focus| Anchor {
            focus,
            pointers: event.pointers.len(),
        })
    }
}
