//! bigview Core Library
//!
//! Scene, viewport and gesture handling for viewing images far larger than
//! can be decoded at once. The viewport always has something to show: the
//! full-resolution cache window when it covers the view, the low-resolution
//! sample otherwise.

pub mod error;
pub mod gesture;
pub mod scene;
pub mod viewport;

pub use error::{SceneError, SceneResult};
pub use gesture::{GestureEvent, MoveGestureDetector, PointerAction, PointerEvent};
pub use scene::Scene;
pub use viewport::{FrameSource, Viewport};
