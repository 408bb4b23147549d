use imark_geometry::{Pose, Quat, Transform, Vec3, normalize_quat};
use serde::{Deserialize, Serialize};

use crate::{FeedbackType, InteractionMode, OrientationMode, Result, UpdateType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    #[serde(default)]
    pub secs: u32,
    #[serde(default)]
    pub nsecs: u32,
}

impl Time {
    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nsecs == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub seq: u32,
    #[serde(default)]
    pub stamp: Time,
    #[serde(default)]
    pub frame_id: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl From<Point> for Vec3 {
    fn from(p: Point) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

impl From<Vec3> for Point {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuaternionMsg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "one")]
    pub w: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl From<QuaternionMsg> for Quat {
    fn from(q: QuaternionMsg) -> Self {
        Quat::new(q.w, q.x, q.y, q.z)
    }
}

impl From<Quat> for QuaternionMsg {
    fn from(q: Quat) -> Self {
        Self {
            x: q.v.x,
            y: q.v.y,
            z: q.v.z,
            w: q.s,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseMsg {
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub orientation: QuaternionMsg,
}

impl From<PoseMsg> for Pose {
    fn from(msg: PoseMsg) -> Self {
        Pose::new(msg.position.into(), msg.orientation.into())
    }
}

impl From<Pose> for PoseMsg {
    fn from(pose: Pose) -> Self {
        Self {
            position: pose.position.into(),
            orientation: pose.orientation.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMsg {
    #[serde(default)]
    pub translation: Point,
    #[serde(default)]
    pub rotation: QuaternionMsg,
}

impl From<TransformMsg> for Transform {
    fn from(msg: TransformMsg) -> Self {
        Transform::new(msg.translation.into(), normalize_quat(msg.rotation.into()))
    }
}

impl From<Transform> for TransformMsg {
    fn from(tf: Transform) -> Self {
        Self {
            translation: tf.translation.into(),
            rotation: tf.rotation.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub id: u32,
    #[serde(default)]
    pub parent_id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub command_type: u8,
}

/// The subset of `visualization_msgs/Marker` a control needs for picking.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualMarker {
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub ns: String,
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub pose: PoseMsg,
    #[serde(default)]
    pub scale: Point,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarkerControl {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub orientation: QuaternionMsg,
    #[serde(default)]
    pub orientation_mode: u8,
    #[serde(default)]
    pub interaction_mode: u8,
    #[serde(default)]
    pub always_visible: bool,
    #[serde(default)]
    pub markers: Vec<VisualMarker>,
    #[serde(default)]
    pub independent_marker_orientation: bool,
    #[serde(default)]
    pub description: String,
}

impl InteractiveMarkerControl {
    pub fn interaction(&self) -> Result<InteractionMode> {
        InteractionMode::try_from(self.interaction_mode)
    }

    pub fn orientation_behavior(&self) -> Result<OrientationMode> {
        OrientationMode::try_from(self.orientation_mode)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarker {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub pose: PoseMsg,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub menu_entries: Vec<MenuEntry>,
    #[serde(default)]
    pub controls: Vec<InteractiveMarkerControl>,
}

impl InteractiveMarker {
    /// A zero stamp means "always current": the marker follows its frame.
    pub fn is_frame_locked(&self) -> bool {
        self.header.stamp.is_zero()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarkerPose {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub pose: PoseMsg,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarkerUpdate {
    #[serde(default)]
    pub server_id: String,
    #[serde(default)]
    pub seq_num: u64,
    #[serde(rename = "type", default = "update_kind")]
    pub kind: u8,
    #[serde(default)]
    pub markers: Vec<InteractiveMarker>,
    #[serde(default)]
    pub poses: Vec<InteractiveMarkerPose>,
    #[serde(default)]
    pub erases: Vec<String>,
}

fn update_kind() -> u8 {
    u8::from(UpdateType::Update)
}

impl Default for InteractiveMarkerUpdate {
    fn default() -> Self {
        Self {
            server_id: String::new(),
            seq_num: 0,
            kind: update_kind(),
            markers: Vec::new(),
            poses: Vec::new(),
            erases: Vec::new(),
        }
    }
}

impl InteractiveMarkerUpdate {
    pub fn update_type(&self) -> Result<UpdateType> {
        UpdateType::try_from(self.kind)
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.poses.is_empty() && self.erases.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarkerInit {
    #[serde(default)]
    pub server_id: String,
    #[serde(default)]
    pub seq_num: u64,
    #[serde(default)]
    pub markers: Vec<InteractiveMarker>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractiveMarkerFeedback {
    pub header: Header,
    pub client_id: String,
    pub marker_name: String,
    pub control_name: String,
    pub event_type: FeedbackType,
    pub pose: PoseMsg,
    pub menu_entry_id: u32,
    pub mouse_point: Point,
    pub mouse_point_valid: bool,
}

/// A transform for one frame, relative to the fixed frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub frame_id: String,
    #[serde(default)]
    pub transform: TransformMsg,
}
