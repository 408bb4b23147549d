use imark_geometry::{Camera, Ray, Vec2};
use imark_scene::{Hit, NodeId};

use super::input::{InputKind, MouseButton};
use super::ui::Point2;

/// Event kinds delivered to scene nodes. Hover kinds are synthesized by the
/// router; the rest mirror [`InputKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    MouseOver,
    MouseOut,
    MouseDown,
    MouseUp,
    MouseMove,
    Click,
    ContextMenu,
    Wheel,
    TouchStart,
    TouchMove,
    TouchEnd,
    TouchLeave,
}

impl From<InputKind> for EventKind {
    fn from(kind: InputKind) -> Self {
        match kind {
            InputKind::MouseDown => Self::MouseDown,
            InputKind::MouseUp => Self::MouseUp,
            InputKind::MouseMove => Self::MouseMove,
            InputKind::Click => Self::Click,
            InputKind::ContextMenu => Self::ContextMenu,
            InputKind::Wheel => Self::Wheel,
            InputKind::MouseOut => Self::MouseOut,
            InputKind::TouchStart => Self::TouchStart,
            InputKind::TouchMove => Self::TouchMove,
            InputKind::TouchEnd => Self::TouchEnd,
            InputKind::TouchLeave => Self::TouchLeave,
        }
    }
}

/// What a single listener decided about an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// Not handled here; hand it to the parent.
    Bubble,
    /// Handled; stop walking the ancestor chain.
    Stop,
    /// Let the router carry on as if nothing had been hit.
    Continue,
}

/// Outcome of delivering an event along a target's ancestor chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyResult {
    Accepted,
    Failed,
    Continued,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    /// The camera controller that receives whatever no node claims.
    Fallback,
}

#[derive(Clone, Debug)]
pub struct Event3d {
    pub kind: EventKind,
    pub button: MouseButton,
    pub position: Point2,
    pub ndc: Vec2,
    pub ray: Ray,
    pub camera: Camera,
    pub intersection: Option<Hit>,
    pub touches: Vec<Point2>,
    pub wheel_delta: f32,
}

impl Event3d {
    pub fn with_kind(&self, kind: EventKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }
}
