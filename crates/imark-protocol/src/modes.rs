use serde::{Deserialize, Serialize};

use crate::Error;

macro_rules! wire_enum {
    ($name:ident, $err:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $($variant),+
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(Error::$err(other)),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                match value {
                    $($name::$variant => $value,)+
                }
            }
        }
    };
}

wire_enum!(InteractionMode, UnknownInteractionMode {
    None = 0,
    Menu = 1,
    Button = 2,
    MoveAxis = 3,
    MovePlane = 4,
    RotateAxis = 5,
    MoveRotate = 6,
});

wire_enum!(OrientationMode, UnknownOrientationMode {
    Inherit = 0,
    Fixed = 1,
    ViewFacing = 2,
});

wire_enum!(FeedbackType, UnknownFeedbackType {
    KeepAlive = 0,
    PoseUpdate = 1,
    MenuSelect = 2,
    ButtonClick = 3,
    MouseDown = 4,
    MouseUp = 5,
});

wire_enum!(UpdateType, UnknownUpdateType {
    KeepAlive = 0,
    Update = 1,
});

impl InteractionMode {
    /// Whether the control reacts to pointer input at all.
    pub fn is_interactive(self) -> bool {
        self != Self::None
    }
}

/// `visualization_msgs/Marker` type codes carried by control visuals.
pub mod marker_type {
    pub const ARROW: i32 = 0;
    pub const CUBE: i32 = 1;
    pub const SPHERE: i32 = 2;
    pub const CYLINDER: i32 = 3;
    pub const LINE_STRIP: i32 = 4;
    pub const LINE_LIST: i32 = 5;
    pub const CUBE_LIST: i32 = 6;
    pub const SPHERE_LIST: i32 = 7;
    pub const POINTS: i32 = 8;
    pub const TEXT_VIEW_FACING: i32 = 9;
    pub const MESH_RESOURCE: i32 = 10;
    pub const TRIANGLE_LIST: i32 = 11;
}
