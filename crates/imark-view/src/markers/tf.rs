use std::collections::{BTreeMap, BTreeSet};

use imark_geometry::Transform;
use tracing::trace;

#[derive(Clone, Debug, Default)]
struct FrameState {
    subscribers: BTreeSet<String>,
    latest: Option<Transform>,
}

/// Fans transforms of named frames out to the markers that follow them.
/// Transforms map a frame into the fixed frame.
#[derive(Clone, Debug)]
pub struct TfClient {
    fixed_frame: String,
    frames: BTreeMap<String, FrameState>,
}

impl TfClient {
    pub fn new(fixed_frame: impl Into<String>) -> Self {
        Self {
            fixed_frame: fixed_frame.into(),
            frames: BTreeMap::new(),
        }
    }

    pub fn fixed_frame(&self) -> &str {
        &self.fixed_frame
    }

    /// Latest known transform for `frame_id`. The fixed frame maps to itself.
    pub fn lookup(&self, frame_id: &str) -> Option<Transform> {
        if self.is_fixed(frame_id) {
            return Some(Transform::identity());
        }
        self.frames.get(frame_id).and_then(|state| state.latest)
    }

    /// Registers `subscriber` for updates of `frame_id` and returns the cached
    /// transform, if any, for immediate delivery.
    pub fn subscribe(&mut self, frame_id: &str, subscriber: &str) -> Option<Transform> {
        self.frames
            .entry(frame_id.to_string())
            .or_default()
            .subscribers
            .insert(subscriber.to_string());
        trace!(frame_id, subscriber, "tf subscribe");
        self.lookup(frame_id)
    }

    pub fn unsubscribe(&mut self, frame_id: &str, subscriber: &str) -> bool {
        let Some(state) = self.frames.get_mut(frame_id) else {
            return false;
        };
        let removed = state.subscribers.remove(subscriber);
        if removed {
            trace!(frame_id, subscriber, "tf unsubscribe");
        }
        removed
    }

    pub fn subscriber_count(&self, frame_id: &str) -> usize {
        self.frames
            .get(frame_id)
            .map_or(0, |state| state.subscribers.len())
    }

    /// Frames someone is currently listening to.
    pub fn wanted_frames(&self) -> Vec<&str> {
        self.frames
            .iter()
            .filter(|(_, state)| !state.subscribers.is_empty())
            .map(|(frame, _)| frame.as_str())
            .collect()
    }

    /// Caches `transform` and returns who must hear about it.
    pub fn process_transform(&mut self, frame_id: &str, transform: Transform) -> Vec<String> {
        let state = self.frames.entry(frame_id.to_string()).or_default();
        state.latest = Some(transform);
        state.subscribers.iter().cloned().collect()
    }

    fn is_fixed(&self, frame_id: &str) -> bool {
        frame_id.trim_start_matches('/') == self.fixed_frame.trim_start_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imark_geometry::{Vec3, identity_quat};

    fn shifted(x: f64) -> Transform {
        Transform::new(Vec3::new(x, 0.0, 0.0), identity_quat())
    }

    #[test]
    fn late_subscribers_get_the_cached_transform() {
        let mut tf = TfClient::new("map");
        assert!(tf.subscribe("odom", "a").is_none());
        assert_eq!(tf.process_transform("odom", shifted(1.0)), vec!["a".to_string()]);
        assert_eq!(tf.subscribe("odom", "b"), Some(shifted(1.0)));
        assert_eq!(tf.subscriber_count("odom"), 2);
    }

    #[test]
    fn unsubscribed_markers_stop_hearing() {
        let mut tf = TfClient::new("map");
        tf.subscribe("odom", "a");
        tf.subscribe("odom", "b");
        assert!(tf.unsubscribe("odom", "a"));
        assert!(!tf.unsubscribe("odom", "a"));
        assert_eq!(tf.process_transform("odom", shifted(2.0)), vec!["b".to_string()]);
        tf.unsubscribe("odom", "b");
        assert!(tf.wanted_frames().is_empty());
    }

    #[test]
    fn fixed_frame_is_identity() {
        let mut tf = TfClient::new("/map");
        assert_eq!(tf.subscribe("map", "a"), Some(Transform::identity()));
    }
}
