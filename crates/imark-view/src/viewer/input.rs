use serde::{Deserialize, Serialize};

use super::ui::Point2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

/// Raw pointer events as the embedding canvas reports them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    MouseDown,
    MouseUp,
    MouseMove,
    Click,
    ContextMenu,
    Wheel,
    MouseOut,
    TouchStart,
    TouchMove,
    TouchEnd,
    TouchLeave,
}

impl InputKind {
    /// Kinds that take part in hover tracking.
    pub fn is_mouse(self) -> bool {
        matches!(
            self,
            Self::MouseDown | Self::MouseUp | Self::MouseMove | Self::Wheel | Self::MouseOut
        )
    }

    pub fn is_touch(self) -> bool {
        matches!(
            self,
            Self::TouchStart | Self::TouchMove | Self::TouchEnd | Self::TouchLeave
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointerInput {
    pub kind: InputKind,
    /// Pointer position; for touch input the mean of the active touches.
    pub position: Point2,
    pub button: MouseButton,
    /// Touches still on the surface after this event.
    pub touches: Vec<Point2>,
    /// Wheel steps, positive when scrolling toward the scene.
    pub wheel_delta: f32,
}

impl PointerInput {
    fn mouse(kind: InputKind, position: Point2, button: MouseButton) -> Self {
        Self {
            kind,
            position,
            button,
            touches: Vec::new(),
            wheel_delta: 0.0,
        }
    }

    fn touch(kind: InputKind, touches: Vec<Point2>, fallback: Point2) -> Self {
        Self {
            kind,
            position: Point2::average(&touches).unwrap_or(fallback),
            button: MouseButton::Primary,
            touches,
            wheel_delta: 0.0,
        }
    }

    pub fn mouse_down(position: Point2, button: MouseButton) -> Self {
        Self::mouse(InputKind::MouseDown, position, button)
    }

    pub fn mouse_up(position: Point2, button: MouseButton) -> Self {
        Self::mouse(InputKind::MouseUp, position, button)
    }

    pub fn mouse_move(position: Point2) -> Self {
        Self::mouse(InputKind::MouseMove, position, MouseButton::Primary)
    }

    pub fn click(position: Point2, button: MouseButton) -> Self {
        Self::mouse(InputKind::Click, position, button)
    }

    pub fn context_menu(position: Point2) -> Self {
        Self::mouse(InputKind::ContextMenu, position, MouseButton::Secondary)
    }

    pub fn wheel(position: Point2, delta: f32) -> Self {
        Self {
            wheel_delta: delta,
            ..Self::mouse(InputKind::Wheel, position, MouseButton::Middle)
        }
    }

    pub fn mouse_out(position: Point2) -> Self {
        Self::mouse(InputKind::MouseOut, position, MouseButton::Primary)
    }

    pub fn touch_start(touches: Vec<Point2>) -> Self {
        Self::touch(InputKind::TouchStart, touches, Point2::default())
    }

    pub fn touch_move(touches: Vec<Point2>) -> Self {
        Self::touch(InputKind::TouchMove, touches, Point2::default())
    }

    /// `remaining` lists the touches still down; `last` positions the event
    /// when none remain.
    pub fn touch_end(remaining: Vec<Point2>, last: Point2) -> Self {
        Self::touch(InputKind::TouchEnd, remaining, last)
    }

    pub fn touch_leave(last: Point2) -> Self {
        Self::touch(InputKind::TouchLeave, Vec::new(), last)
    }
}
