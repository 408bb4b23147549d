pub mod event;
pub mod input;
pub mod orbit;
pub mod router;
pub mod ui;

use std::time::Duration;

use anyhow::Result;
use imark_geometry::{Camera, Transform, Vec3};
use imark_protocol::{InteractiveMarkerInit, InteractiveMarkerUpdate, Topics};
use imark_scene::{NodeId, SceneGraph};
use tracing::trace;

pub use event::{Event3d, EventKind, NotifyResult, Propagation, Target};
pub use input::{InputKind, MouseButton, PointerInput};
pub use orbit::OrbitControls;
pub use router::{EventListeners, MouseRouter};
pub use ui::{Point2, Rect, Vec2, pos2, vec2};

use crate::config::ViewerConfig;
use crate::markers::{FeedbackPublisher, InteractiveMarkerClient};

/// Receives one finished frame. Drawing is up to the embedding.
pub trait RenderSink {
    fn render(&mut self, scene: &SceneGraph, camera: &Camera);
}

/// Counts frames and draws nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessSink {
    pub frames: u64,
}

impl RenderSink for HeadlessSink {
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) {
        self.frames += 1;
        trace!(frame = self.frames, nodes = scene.len(), position = ?camera.position, "frame");
    }
}

/// Hands routed events to marker controls, or to the orbit controller when
/// nothing in the scene wants them.
struct Dispatcher<'a> {
    scene: &'a mut SceneGraph,
    camera: &'a mut Camera,
    orbit: &'a mut OrbitControls,
    markers: &'a mut InteractiveMarkerClient,
}

impl EventListeners for Dispatcher<'_> {
    fn scene(&self) -> &SceneGraph {
        &*self.scene
    }

    fn deliver(&mut self, target: Target, event: &Event3d) -> Propagation {
        match target {
            Target::Fallback => self.orbit.handle(self.camera, event),
            Target::Node(node) if self.markers.owns(node) => {
                self.markers.handle_event(self.scene, node, event)
            }
            Target::Node(_) => Propagation::Bubble,
        }
    }
}

/// Scene, camera, input routing and one marker client, advanced one frame at
/// a time by the embedding.
#[derive(Debug)]
pub struct Viewer {
    scene: SceneGraph,
    selectable: NodeId,
    camera: Camera,
    orbit: OrbitControls,
    router: MouseRouter,
    markers: InteractiveMarkerClient,
    dirty: bool,
}

impl Viewer {
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let mut scene = SceneGraph::new();
        let selectable = scene.add_child(scene.root(), "selectable")?;

        let view = &config.camera;
        let mut camera = Camera::perspective(
            view.fov_deg,
            f64::from(view.width) / f64::from(view.height.max(1.0)),
            view.near,
            view.far,
        )?;
        let [x, y, z] = view.position;
        camera.position = Vec3::new(x, y, z);

        let orbit = OrbitControls::new(config.orbit.clone());
        camera.look_at(orbit.center);

        let router = MouseRouter::new(
            selectable,
            Rect::from_min_size(pos2(0.0, 0.0), vec2(view.width, view.height)),
        );
        let markers = InteractiveMarkerClient::new(&mut scene, selectable, config.markers.clone())?;

        Ok(Self {
            scene,
            selectable,
            camera,
            orbit,
            router,
            markers,
            dirty: true,
        })
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Node whose subtree takes part in pointer picking.
    pub fn selectable(&self) -> NodeId {
        self.selectable
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn orbit(&self) -> &OrbitControls {
        &self.orbit
    }

    pub fn router(&self) -> &MouseRouter {
        &self.router
    }

    pub fn markers(&self) -> &InteractiveMarkerClient {
        &self.markers
    }

    /// Whether something changed since the last frame was rendered.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Device position a world point is drawn at, if it lies inside the view
    /// volume.
    pub fn screen_point(&self, world: Vec3) -> Option<Point2> {
        let ndc = self.camera.project(world);
        if !ndc.z.is_finite() || ndc.z.abs() > 1.0 {
            return None;
        }
        Some(self.router.viewport().to_device(ndc.truncate()))
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        self.router
            .set_viewport(Rect::from_min_size(pos2(0.0, 0.0), vec2(width, height)));
        self.camera.set_aspect(f64::from(width) / f64::from(height));
        self.dirty = true;
    }

    pub fn handle_input(&mut self, input: &PointerInput) {
        let camera = self.camera;
        let mut dispatcher = Dispatcher {
            scene: &mut self.scene,
            camera: &mut self.camera,
            orbit: &mut self.orbit,
            markers: &mut self.markers,
        };
        self.router.process(input, &camera, &mut dispatcher);
        let accepted = self.router.take_accepted();
        if !accepted.is_empty() {
            trace!(?accepted, "scene consumed input");
            self.dirty = true;
        }
    }

    /// Advances one frame: camera, control orientations, feedback resends,
    /// then hands the result to `sink`.
    pub fn frame(&mut self, now: Duration, sink: &mut impl RenderSink) {
        if self.orbit.update(&mut self.camera) {
            self.dirty = true;
        }
        self.markers.update(&mut self.scene, &self.camera);
        self.markers.advance_time(now);
        sink.render(&self.scene, &self.camera);
        self.dirty = false;
    }

    pub fn subscribe(&mut self, topic: &str) -> Topics {
        self.markers.subscribe(&mut self.scene, topic).clone()
    }

    pub fn unsubscribe(&mut self) {
        self.markers.unsubscribe(&mut self.scene);
    }

    pub fn process_init(&mut self, init: &InteractiveMarkerInit) {
        self.markers.process_init(&mut self.scene, init);
        self.dirty = true;
    }

    pub fn process_update(&mut self, update: &InteractiveMarkerUpdate) {
        self.markers.process_update(&mut self.scene, update);
        self.dirty = true;
    }

    pub fn process_transform(&mut self, frame_id: &str, tf: Transform) {
        self.markers.process_transform(&mut self.scene, frame_id, tf);
        self.dirty = true;
    }

    pub fn select_menu_entry(&mut self, marker: &str, entry_id: u32) -> bool {
        self.markers.select_menu_entry(&self.scene, marker, entry_id)
    }

    pub fn flush_feedback(&mut self, publisher: &mut impl FeedbackPublisher) -> usize {
        self.markers.flush_feedback(publisher)
    }
}
