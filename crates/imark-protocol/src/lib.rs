use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod messages;
mod modes;

pub use messages::{
    FrameTransform, Header, InteractiveMarker, InteractiveMarkerControl, InteractiveMarkerFeedback,
    InteractiveMarkerInit, InteractiveMarkerPose, InteractiveMarkerUpdate, MenuEntry, Point,
    PoseMsg, QuaternionMsg, Time, TransformMsg, VisualMarker,
};
pub use modes::{FeedbackType, InteractionMode, OrientationMode, UpdateType, marker_type};

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown interaction mode {0}")]
    UnknownInteractionMode(u8),
    #[error("unknown orientation mode {0}")]
    UnknownOrientationMode(u8),
    #[error("unknown feedback type {0}")]
    UnknownFeedbackType(u8),
    #[error("unknown update type {0}")]
    UnknownUpdateType(u8),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Topic and service names an interactive marker server is reached through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    pub update: String,
    pub feedback: String,
    pub init: String,
}

impl Topics {
    pub fn for_server(topic: &str) -> Self {
        let base = topic.trim_end_matches('/');
        Self {
            update: format!("{base}/tunneled/update"),
            feedback: format!("{base}/feedback"),
            init: format!("{base}/tunneled/get_init"),
        }
    }
}

pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imark_geometry::{Pose, Quat, Vec3};

    #[test]
    fn topics_follow_server_name() {
        let topics = Topics::for_server("/basic_controls/");
        assert_eq!(topics.update, "/basic_controls/tunneled/update");
        assert_eq!(topics.feedback, "/basic_controls/feedback");
        assert_eq!(topics.init, "/basic_controls/tunneled/get_init");
    }

    #[test]
    fn update_decodes_with_defaults() -> Result<()> {
        let update: InteractiveMarkerUpdate = from_json(
            r#"{
                "server_id": "/basic_controls",
                "seq_num": 4,
                "type": 1,
                "markers": [{
                    "header": {"frame_id": "base_link", "stamp": {"secs": 0, "nsecs": 0}},
                    "name": "simple_6dof",
                    "pose": {"position": {"x": 1.0, "y": 2.0, "z": 0.0}},
                    "controls": [{"name": "move_x", "interaction_mode": 3}]
                }],
                "erases": ["old"]
            }"#,
        )?;
        assert_eq!(update.update_type()?, UpdateType::Update);
        let marker = &update.markers[0];
        assert!(marker.is_frame_locked());
        assert_eq!(marker.scale, 1.0);
        assert_eq!(marker.pose.orientation.w, 1.0);
        assert_eq!(marker.controls[0].interaction()?, InteractionMode::MoveAxis);
        assert_eq!(marker.controls[0].orientation_behavior()?, OrientationMode::Inherit);
        assert!(update.poses.is_empty());
        assert_eq!(update.erases, vec!["old".to_string()]);
        Ok(())
    }

    #[test]
    fn feedback_serializes_event_type_as_number() -> Result<()> {
        let pose = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::new(1.0, 0.0, 0.0, 0.0));
        let feedback = InteractiveMarkerFeedback {
            header: Header::default(),
            client_id: "imark".to_string(),
            marker_name: "m".to_string(),
            control_name: "c".to_string(),
            event_type: FeedbackType::PoseUpdate,
            pose: pose.into(),
            menu_entry_id: 0,
            mouse_point: Point::default(),
            mouse_point_valid: false,
        };
        let text = to_json(&feedback)?;
        assert!(text.contains("\"event_type\":1"));
        let back: InteractiveMarkerFeedback = from_json(&text)?;
        assert_eq!(back, feedback);
        Ok(())
    }
}
