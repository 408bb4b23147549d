use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

use imark_geometry::{Camera, Pose, Transform};
use imark_protocol::{
    InteractiveMarker as MarkerMsg, InteractiveMarkerFeedback, InteractiveMarkerInit,
    InteractiveMarkerUpdate, Topics, UpdateType,
};
use imark_scene::{NodeId, SceneGraph};
use tracing::{debug, info, warn};

use super::handle::MarkerHandle;
use super::marker::InteractiveMarker;
use super::tf::TfClient;
use super::timer::TimerQueue;
use crate::config::MarkerConfig;
use crate::viewer::event::{Event3d, Propagation};

/// Where outgoing feedback goes.
pub trait FeedbackPublisher {
    fn publish(&mut self, topic: &str, feedback: InteractiveMarkerFeedback);
}

impl FeedbackPublisher for Vec<InteractiveMarkerFeedback> {
    fn publish(&mut self, _topic: &str, feedback: InteractiveMarkerFeedback) {
        self.push(feedback);
    }
}

/// Everything the client knows about one server marker. Dropping the entry
/// drops every binding between its marker and handle.
#[derive(Debug)]
struct MarkerEntry {
    handle: MarkerHandle,
    marker: InteractiveMarker,
}

/// Mirrors one interactive marker server into the scene and reports user
/// interaction back to it.
#[derive(Debug)]
pub struct InteractiveMarkerClient {
    root: NodeId,
    config: MarkerConfig,
    topics: Option<Topics>,
    entries: BTreeMap<String, MarkerEntry>,
    owners: HashMap<NodeId, String>,
    tf: TfClient,
    timers: TimerQueue<String>,
    feedback_tx: Sender<InteractiveMarkerFeedback>,
    feedback_rx: Receiver<InteractiveMarkerFeedback>,
}

impl InteractiveMarkerClient {
    /// Creates the node every marker hangs off, under `parent`.
    pub fn new(
        scene: &mut SceneGraph,
        parent: NodeId,
        config: MarkerConfig,
    ) -> imark_scene::Result<Self> {
        let root = scene.add_child(parent, "interactive_markers")?;
        let (feedback_tx, feedback_rx) = channel();
        Ok(Self {
            root,
            tf: TfClient::new(config.fixed_frame.clone()),
            config,
            topics: None,
            entries: BTreeMap::new(),
            owners: HashMap::new(),
            timers: TimerQueue::new(),
            feedback_tx,
            feedback_rx,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn topics(&self) -> Option<&Topics> {
        self.topics.as_ref()
    }

    pub fn tf(&self) -> &TfClient {
        &self.tf
    }

    pub fn timers(&self) -> &TimerQueue<String> {
        &self.timers
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn marker(&self, name: &str) -> Option<&InteractiveMarker> {
        self.entries.get(name).map(|entry| &entry.marker)
    }

    pub fn handle(&self, name: &str) -> Option<&MarkerHandle> {
        self.entries.get(name).map(|entry| &entry.handle)
    }

    /// Whether `node` is a control of one of this client's markers.
    pub fn owns(&self, node: NodeId) -> bool {
        self.owners.contains_key(&node)
    }

    /// Switches to the server at `topic`, dropping whatever the previous
    /// server had shown. The caller fetches the initial state from
    /// `Topics::init` and passes it to [`Self::process_init`].
    pub fn subscribe(&mut self, scene: &mut SceneGraph, topic: &str) -> &Topics {
        self.unsubscribe(scene);
        let topics = Topics::for_server(topic);
        info!(update = %topics.update, feedback = %topics.feedback, "subscribing to marker server");
        self.topics.insert(topics)
    }

    pub fn unsubscribe(&mut self, scene: &mut SceneGraph) {
        if let Some(topics) = self.topics.take() {
            info!(update = %topics.update, "unsubscribing from marker server");
        }
        self.erase_all(scene);
    }

    /// Replaces everything with the server's full state.
    pub fn process_init(&mut self, scene: &mut SceneGraph, init: &InteractiveMarkerInit) {
        debug!(server = %init.server_id, markers = init.markers.len(), "init");
        self.erase_all(scene);
        for msg in &init.markers {
            self.add(scene, msg);
        }
    }

    /// Applies erases, then pose updates, then adds.
    pub fn process_update(&mut self, scene: &mut SceneGraph, update: &InteractiveMarkerUpdate) {
        match update.update_type() {
            Ok(UpdateType::KeepAlive) => {
                debug!(server = %update.server_id, "keep-alive");
                return;
            }
            Ok(UpdateType::Update) => {}
            Err(err) => {
                warn!(server = %update.server_id, %err, "dropping update");
                return;
            }
        }

        for name in &update.erases {
            if !self.erase(scene, name) {
                debug!(marker = %name, "erase for unknown marker");
            }
        }

        for msg in &update.poses {
            let Some(entry) = self.entries.get_mut(&msg.name) else {
                debug!(marker = %msg.name, "pose for unknown marker");
                continue;
            };
            let world = entry.handle.set_pose_from_server(Pose::from(msg.pose));
            entry.marker.on_server_set_pose(scene, world);
        }

        for msg in &update.markers {
            self.add(scene, msg);
        }
    }

    /// Delivers a transform of `frame_id` to every marker following it.
    pub fn process_transform(&mut self, scene: &mut SceneGraph, frame_id: &str, tf: Transform) {
        for name in self.tf.process_transform(frame_id, tf) {
            if let Some(entry) = self.entries.get_mut(&name) {
                let world = entry.handle.set_tf_transform(tf);
                entry.marker.on_server_set_pose(scene, world);
            }
        }
    }

    /// Routes a scene event to the marker owning `node` and forwards what
    /// the marker reports to its handle.
    pub fn handle_event(
        &mut self,
        scene: &mut SceneGraph,
        node: NodeId,
        event: &Event3d,
    ) -> Propagation {
        let Some(entry) = self
            .owners
            .get(&node)
            .and_then(|name| self.entries.get_mut(name))
        else {
            return Propagation::Bubble;
        };
        let outcome = entry.marker.handle_event(scene, node, event);
        for marker_event in entry.marker.take_events() {
            entry.handle.on_marker_event(&marker_event, &mut self.timers);
        }
        outcome
    }

    /// Picks `entry_id` from the open menu of marker `name`.
    pub fn select_menu_entry(&mut self, scene: &SceneGraph, name: &str, entry_id: u32) -> bool {
        let Some(entry) = self.entries.get_mut(name) else {
            return false;
        };
        let picked = entry.marker.select_menu_entry(scene, entry_id);
        for marker_event in entry.marker.take_events() {
            entry.handle.on_marker_event(&marker_event, &mut self.timers);
        }
        picked
    }

    /// Per-frame control orientation refresh.
    pub fn update(&mut self, scene: &mut SceneGraph, camera: &Camera) {
        for entry in self.entries.values_mut() {
            entry.marker.update_controls(scene, camera);
        }
    }

    /// Advances the resend clock to `now` and runs whatever came due.
    pub fn advance_time(&mut self, now: Duration) -> usize {
        let mut resent = 0;
        for (id, name) in self.timers.advance_to(now) {
            if let Some(entry) = self.entries.get_mut(&name) {
                if entry.handle.resend(id, &mut self.timers) {
                    resent += 1;
                }
            }
        }
        resent
    }

    /// Feedback produced so far, oldest first.
    pub fn drain_feedback(&self) -> Vec<InteractiveMarkerFeedback> {
        self.feedback_rx.try_iter().collect()
    }

    /// Hands pending feedback to `publisher` on the feedback topic. Without a
    /// subscription the feedback is dropped.
    pub fn flush_feedback(&self, publisher: &mut impl FeedbackPublisher) -> usize {
        let pending = self.drain_feedback();
        let Some(topics) = self.topics.as_ref() else {
            if !pending.is_empty() {
                debug!(count = pending.len(), "no server to send feedback to");
            }
            return 0;
        };
        let count = pending.len();
        for feedback in pending {
            publisher.publish(&topics.feedback, feedback);
        }
        count
    }

    fn add(&mut self, scene: &mut SceneGraph, msg: &MarkerMsg) {
        self.erase(scene, &msg.name);

        let mut handle = MarkerHandle::new(
            msg,
            &self.config.client_id,
            self.config.resend_interval(),
            self.feedback_tx.clone(),
        );
        let cached = if handle.is_frame_locked() {
            self.tf.subscribe(handle.frame_id(), &msg.name)
        } else {
            self.tf.lookup(handle.frame_id())
        };
        if let Some(tf) = cached {
            handle.set_tf_transform(tf);
        }

        let marker = match InteractiveMarker::new(scene, self.root, msg, handle.world_pose()) {
            Ok(marker) => marker,
            Err(err) => {
                warn!(marker = %msg.name, %err, "could not build marker");
                if handle.is_frame_locked() {
                    self.tf.unsubscribe(handle.frame_id(), &msg.name);
                }
                return;
            }
        };
        for node in marker.control_nodes() {
            self.owners.insert(node, msg.name.clone());
        }
        debug!(marker = %msg.name, frame = %handle.frame_id(), "marker added");
        self.entries
            .insert(msg.name.clone(), MarkerEntry { handle, marker });
    }

    fn erase(&mut self, scene: &mut SceneGraph, name: &str) -> bool {
        let Some(mut entry) = self.entries.remove(name) else {
            return false;
        };
        if entry.handle.is_frame_locked() {
            self.tf.unsubscribe(entry.handle.frame_id(), name);
        }
        entry.handle.cancel_resend(&mut self.timers);
        for node in entry.marker.control_nodes() {
            self.owners.remove(&node);
        }
        entry.marker.dispose(scene);
        debug!(marker = %name, "marker erased");
        true
    }

    fn erase_all(&mut self, scene: &mut SceneGraph) {
        let names: Vec<String> = self.entries.keys().cloned().collect();
        for name in names {
            self.erase(scene, &name);
        }
    }
}
