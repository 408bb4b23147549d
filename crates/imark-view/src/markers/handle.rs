use std::sync::mpsc::Sender;
use std::time::Duration;

use imark_geometry::{Pose, Transform, Vec3};
use imark_protocol::{FeedbackType, Header, InteractiveMarker as MarkerMsg, InteractiveMarkerFeedback};
use tracing::{debug, trace};

use super::marker::{MarkerEvent, MarkerEventKind};
use super::timer::{TimerId, TimerQueue};

/// Client-side record of one server marker: the last pose the server sent in
/// its own frame, the frame's transform, and the feedback channel back.
#[derive(Debug)]
pub struct MarkerHandle {
    name: String,
    client_id: String,
    header: Header,
    pose: Pose,
    tf_transform: Transform,
    dragging: bool,
    resend: Option<TimerId>,
    last_pose_event: Option<MarkerEvent>,
    resend_interval: Duration,
    feedback: Sender<InteractiveMarkerFeedback>,
}

impl MarkerHandle {
    pub fn new(
        msg: &MarkerMsg,
        client_id: &str,
        resend_interval: Duration,
        feedback: Sender<InteractiveMarkerFeedback>,
    ) -> Self {
        Self {
            name: msg.name.clone(),
            client_id: client_id.to_string(),
            header: msg.header.clone(),
            pose: Pose::from(msg.pose).normalized(),
            tf_transform: Transform::identity(),
            dragging: false,
            resend: None,
            last_pose_event: None,
            resend_interval,
            feedback,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_id(&self) -> &str {
        &self.header.frame_id
    }

    pub fn is_frame_locked(&self) -> bool {
        self.header.stamp.is_zero()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Pose in the marker's own frame.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn tf_transform(&self) -> Transform {
        self.tf_transform
    }

    pub fn pending_resend(&self) -> Option<TimerId> {
        self.resend
    }

    /// Pose in the fixed frame, as the scene shows it.
    pub fn world_pose(&self) -> Pose {
        self.pose.transformed(&self.tf_transform)
    }

    pub fn set_pose_from_server(&mut self, pose: Pose) -> Pose {
        self.pose = pose.normalized();
        self.world_pose()
    }

    pub fn set_tf_transform(&mut self, tf: Transform) -> Pose {
        self.tf_transform = tf;
        self.world_pose()
    }

    pub fn on_marker_event(&mut self, event: &MarkerEvent, timers: &mut TimerQueue<String>) {
        match event.kind {
            MarkerEventKind::PoseChange => self.set_pose_from_client(event, timers),
            MarkerEventKind::MouseDown => {
                self.send(FeedbackType::MouseDown, event, 0);
                self.dragging = true;
            }
            MarkerEventKind::MouseUp => {
                self.send(FeedbackType::MouseUp, event, 0);
                self.dragging = false;
                self.cancel_resend(timers);
            }
            MarkerEventKind::ButtonClick => self.send(FeedbackType::ButtonClick, event, 0),
            MarkerEventKind::MenuSelect { entry_id } => {
                self.send(FeedbackType::MenuSelect, event, entry_id)
            }
        }
    }

    /// Takes a pose the user dragged to, maps it back into the marker frame
    /// and reports it. While the drag is held the report repeats until a
    /// newer pose or the release replaces it.
    pub fn set_pose_from_client(&mut self, event: &MarkerEvent, timers: &mut TimerQueue<String>) {
        self.pose = self.tf_transform.inverse().apply(&event.pose).normalized();
        self.send(FeedbackType::PoseUpdate, event, 0);

        if self.dragging {
            self.cancel_resend(timers);
            self.resend = Some(timers.schedule(self.resend_interval, self.name.clone()));
            self.last_pose_event = Some(event.clone());
        }
    }

    /// Called when timer `id` fires. Stale timers are ignored.
    pub fn resend(&mut self, id: TimerId, timers: &mut TimerQueue<String>) -> bool {
        if self.resend != Some(id) {
            return false;
        }
        self.resend = None;
        let Some(event) = self.last_pose_event.clone() else {
            return false;
        };
        trace!(marker = %self.name, "resending pose");
        self.set_pose_from_client(&event, timers);
        true
    }

    pub fn cancel_resend(&mut self, timers: &mut TimerQueue<String>) {
        if let Some(id) = self.resend.take() {
            timers.cancel(id);
        }
    }

    fn send(&self, event_type: FeedbackType, event: &MarkerEvent, menu_entry_id: u32) {
        let mouse_point_valid = event.click_point.is_some()
            && matches!(
                event_type,
                FeedbackType::MouseDown | FeedbackType::MouseUp | FeedbackType::ButtonClick
            );
        let feedback = InteractiveMarkerFeedback {
            header: self.header.clone(),
            client_id: self.client_id.clone(),
            marker_name: self.name.clone(),
            control_name: event.control_name.clone(),
            event_type,
            pose: self.pose.into(),
            menu_entry_id,
            mouse_point: event.click_point.unwrap_or(Vec3::new(0.0, 0.0, 0.0)).into(),
            mouse_point_valid,
        };
        if self.feedback.send(feedback).is_err() {
            debug!(marker = %self.name, "feedback receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imark_geometry::identity_quat;
    use std::sync::mpsc::{Receiver, channel};

    fn handle() -> (MarkerHandle, Receiver<InteractiveMarkerFeedback>) {
        let (tx, rx) = channel();
        let msg = MarkerMsg {
            name: "m".to_string(),
            header: Header {
                frame_id: "odom".to_string(),
                ..Header::default()
            },
            ..MarkerMsg::default()
        };
        (
            MarkerHandle::new(&msg, "tester", Duration::from_millis(250), tx),
            rx,
        )
    }

    fn event(kind: MarkerEventKind, x: f64) -> MarkerEvent {
        MarkerEvent {
            kind,
            pose: Pose::new(Vec3::new(x, 0.0, 0.0), identity_quat()),
            control_name: "move_x".to_string(),
            click_point: Some(Vec3::new(x, 0.0, 0.0)),
        }
    }

    #[test]
    fn client_poses_are_reported_in_the_marker_frame() {
        let (mut handle, rx) = handle();
        let mut timers = TimerQueue::new();
        let world = handle.set_tf_transform(Transform::new(Vec3::new(1.0, 0.0, 0.0), identity_quat()));
        assert_eq!(world.position, Vec3::new(1.0, 0.0, 0.0));

        handle.on_marker_event(&event(MarkerEventKind::PoseChange, 3.0), &mut timers);
        let sent = rx.try_recv().expect("feedback");
        assert_eq!(sent.event_type, FeedbackType::PoseUpdate);
        assert_eq!(sent.pose.position.x, 2.0);
        assert_eq!(sent.header.frame_id, "odom");
        assert!(!sent.mouse_point_valid);
        // Not dragging: nothing to resend.
        assert!(timers.is_empty());
    }

    #[test]
    fn held_drag_resends_only_the_latest_pose() {
        let (mut handle, rx) = handle();
        let mut timers = TimerQueue::new();
        handle.on_marker_event(&event(MarkerEventKind::MouseDown, 0.0), &mut timers);
        for x in [1.0, 2.0, 3.0] {
            handle.on_marker_event(&event(MarkerEventKind::PoseChange, x), &mut timers);
        }
        assert_eq!(timers.len(), 1);
        let sent: Vec<_> = rx.try_iter().collect();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].mouse_point_valid);

        for (id, name) in timers.advance_to(Duration::from_millis(250)) {
            assert_eq!(name, "m");
            assert!(handle.resend(id, &mut timers));
        }
        let resent: Vec<_> = rx.try_iter().collect();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].event_type, FeedbackType::PoseUpdate);
        assert_eq!(resent[0].pose.position.x, 3.0);
        // Still held, so another resend is queued.
        assert_eq!(timers.len(), 1);

        handle.on_marker_event(&event(MarkerEventKind::MouseUp, 3.0), &mut timers);
        assert!(timers.is_empty());
        assert!(handle.pending_resend().is_none());
        assert!(timers.advance_to(Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn menu_and_button_feedback() {
        let (mut handle, rx) = handle();
        let mut timers = TimerQueue::new();
        handle.on_marker_event(&event(MarkerEventKind::ButtonClick, 0.5), &mut timers);
        handle.on_marker_event(
            &MarkerEvent {
                click_point: None,
                ..event(MarkerEventKind::MenuSelect { entry_id: 7 }, 0.0)
            },
            &mut timers,
        );
        let sent: Vec<_> = rx.try_iter().collect();
        assert_eq!(sent[0].event_type, FeedbackType::ButtonClick);
        assert!(sent[0].mouse_point_valid);
        assert_eq!(sent[0].mouse_point.x, 0.5);
        assert_eq!(sent[1].event_type, FeedbackType::MenuSelect);
        assert_eq!(sent[1].menu_entry_id, 7);
        assert_eq!(sent[1].client_id, "tester");
    }

    #[test]
    fn stale_timer_ids_are_ignored() {
        let (mut handle, _rx) = handle();
        let mut timers = TimerQueue::new();
        let stray = timers.schedule(Duration::ZERO, "m".to_string());
        assert!(!handle.resend(stray, &mut timers));
    }
}
