use imark_geometry::Camera;
use imark_scene::{Hit, NodeId, SceneGraph};
use tracing::{debug, trace};

use super::event::{Event3d, EventKind, NotifyResult, Propagation, Target};
use super::input::{InputKind, PointerInput};
use super::ui::Rect;

/// Whatever can receive routed events. The router only reads the scene to
/// resolve ancestor chains; delivery may mutate anything else.
pub trait EventListeners {
    fn scene(&self) -> &SceneGraph;
    fn deliver(&mut self, target: Target, event: &Event3d) -> Propagation;
}

/// Turns canvas pointer input into scene events with hover tracking, drag
/// capture and ancestor bubbling.
#[derive(Clone, Debug)]
pub struct MouseRouter {
    selectable: NodeId,
    viewport: Rect,
    last_target: Option<Target>,
    dragging: bool,
    last_intersection: Option<Hit>,
    accepted: Vec<EventKind>,
}

impl MouseRouter {
    pub fn new(selectable: NodeId, viewport: Rect) -> Self {
        Self {
            selectable,
            viewport,
            last_target: None,
            dragging: false,
            last_intersection: None,
            accepted: Vec::new(),
        }
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn last_target(&self) -> Option<Target> {
        self.last_target
    }

    /// Kinds accepted by some listener since the last call.
    pub fn take_accepted(&mut self) -> Vec<EventKind> {
        std::mem::take(&mut self.accepted)
    }

    pub fn process(
        &mut self,
        input: &PointerInput,
        camera: &Camera,
        listeners: &mut impl EventListeners,
    ) {
        let ndc = self.viewport.to_ndc(input.position);
        let Some(ray) = camera.ray_through(ndc) else {
            debug!(?ndc, "camera cannot produce a pointer ray");
            return;
        };
        let mut event = Event3d {
            kind: input.kind.into(),
            button: input.button,
            position: input.position,
            ndc,
            ray,
            camera: *camera,
            intersection: self.last_intersection,
            touches: input.touches.clone(),
            wheel_delta: input.wheel_delta,
        };

        let leaving = match input.kind {
            InputKind::MouseOut => Some(EventKind::MouseOut),
            InputKind::TouchLeave => Some(EventKind::TouchLeave),
            InputKind::TouchEnd if input.touches.is_empty() => Some(EventKind::TouchLeave),
            _ => None,
        };
        if let Some(kind) = leaving {
            let last = self.last_target.take();
            if self.dragging {
                self.notify(last, EventKind::MouseUp, &event, listeners);
                self.dragging = false;
            }
            self.notify(last, kind, &event, listeners);
            return;
        }

        if self.dragging {
            self.notify(self.last_target, event.kind, &event, listeners);
            if matches!(
                event.kind,
                EventKind::MouseUp | EventKind::Click | EventKind::TouchEnd
            ) {
                self.dragging = false;
            }
            return;
        }

        let hits = listeners.scene().raycast(&event.ray, self.selectable);
        let mut target = match hits.first() {
            Some(hit) => {
                self.last_intersection = Some(*hit);
                event.intersection = Some(*hit);
                Target::Node(hit.node)
            }
            None => Target::Fallback,
        };

        let last = self.last_target;
        let mut delivered = false;
        if Some(target) != last {
            if input.kind.is_mouse() {
                match self.notify(Some(target), EventKind::MouseOver, &event, listeners) {
                    NotifyResult::Accepted => {
                        self.notify(last, EventKind::MouseOut, &event, listeners);
                    }
                    NotifyResult::Failed => {
                        target = Target::Fallback;
                        if Some(target) != last {
                            self.notify(Some(target), EventKind::MouseOver, &event, listeners);
                            self.notify(last, EventKind::MouseOut, &event, listeners);
                        }
                    }
                    NotifyResult::Continued => {}
                }
            } else if input.kind.is_touch() {
                delivered = true;
                match self.notify(Some(target), event.kind, &event, listeners) {
                    NotifyResult::Accepted => {
                        self.notify(last, EventKind::TouchLeave, &event, listeners);
                        self.notify(last, EventKind::TouchEnd, &event, listeners);
                    }
                    NotifyResult::Failed => {
                        target = Target::Fallback;
                        delivered = false;
                        if Some(target) != last {
                            self.notify(last, EventKind::TouchMove, &event, listeners);
                            self.notify(last, EventKind::TouchEnd, &event, listeners);
                        }
                    }
                    NotifyResult::Continued => {}
                }
            }
        }

        if !delivered {
            self.notify(Some(target), event.kind, &event, listeners);
        }
        if matches!(
            event.kind,
            EventKind::MouseDown | EventKind::TouchStart | EventKind::TouchMove
        ) {
            self.dragging = true;
        }
        self.last_target = Some(target);
    }

    /// Delivers `kind` to `target` and then to each ancestor until a listener
    /// stops or continues it. The fallback has no ancestors.
    pub fn notify(
        &mut self,
        target: Option<Target>,
        kind: EventKind,
        event: &Event3d,
        listeners: &mut impl EventListeners,
    ) -> NotifyResult {
        let Some(target) = target else {
            return NotifyResult::Failed;
        };
        let event = event.with_kind(kind);
        let chain = match target {
            Target::Node(node) => listeners
                .scene()
                .ancestors(node)
                .into_iter()
                .map(Target::Node)
                .collect(),
            Target::Fallback => vec![Target::Fallback],
        };

        for current in chain {
            match listeners.deliver(current, &event) {
                Propagation::Stop => {
                    trace!(?kind, ?current, "event accepted");
                    self.accepted.push(kind);
                    return NotifyResult::Accepted;
                }
                Propagation::Continue => return NotifyResult::Continued,
                Propagation::Bubble => {}
            }
        }
        NotifyResult::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::input::MouseButton;
    use crate::viewer::ui::{pos2, vec2};
    use imark_geometry::{Pose, Vec3, identity_quat};
    use imark_scene::HitShape;
    use std::collections::HashMap;

    struct Recorder {
        scene: SceneGraph,
        replies: HashMap<(NodeId, EventKind), Propagation>,
        log: Vec<(Target, EventKind)>,
    }

    impl EventListeners for Recorder {
        fn scene(&self) -> &SceneGraph {
            &self.scene
        }

        fn deliver(&mut self, target: Target, event: &Event3d) -> Propagation {
            self.log.push((target, event.kind));
            match target {
                Target::Node(node) => self
                    .replies
                    .get(&(node, event.kind))
                    .copied()
                    .unwrap_or(Propagation::Bubble),
                Target::Fallback => Propagation::Bubble,
            }
        }
    }

    struct Fixture {
        router: MouseRouter,
        camera: Camera,
        listeners: Recorder,
        parent: NodeId,
        child: NodeId,
    }

    fn fixture() -> Fixture {
        let mut scene = SceneGraph::new();
        let selectable = scene.add_child(scene.root(), "selectable").expect("root exists");
        let parent = scene.add_child(selectable, "parent").expect("parent");
        let child = scene.add_child(parent, "child").expect("child");
        scene
            .set_local_pose(parent, Pose::new(Vec3::new(0.0, 0.0, 0.0), identity_quat()))
            .expect("pose");
        scene
            .set_shape(child, Some(HitShape::Sphere { radius: 0.5 }))
            .expect("shape");

        let mut camera = Camera::perspective(60.0, 1.0, 0.01, 100.0).expect("camera");
        camera.position = Vec3::new(0.0, -5.0, 0.0);
        camera.look_at(Vec3::new(0.0, 0.0, 0.0));

        Fixture {
            router: MouseRouter::new(
                selectable,
                Rect::from_min_size(pos2(0.0, 0.0), vec2(100.0, 100.0)),
            ),
            camera,
            listeners: Recorder {
                scene,
                replies: HashMap::new(),
                log: Vec::new(),
            },
            parent,
            child,
        }
    }

    const ON_SPHERE: crate::viewer::ui::Point2 = pos2(50.0, 50.0);
    const OFF_SPHERE: crate::viewer::ui::Point2 = pos2(2.0, 2.0);

    #[test]
    fn stop_accepts_and_shields_ancestors() {
        let mut f = fixture();
        f.listeners
            .replies
            .insert((f.child, EventKind::MouseOver), Propagation::Stop);
        f.listeners
            .replies
            .insert((f.child, EventKind::MouseMove), Propagation::Stop);

        f.router
            .process(&PointerInput::mouse_move(ON_SPHERE), &f.camera, &mut f.listeners);

        let log = &f.listeners.log;
        assert!(log.contains(&(Target::Node(f.child), EventKind::MouseOver)));
        assert!(log.contains(&(Target::Node(f.child), EventKind::MouseMove)));
        assert!(!log.contains(&(Target::Node(f.parent), EventKind::MouseOver)));
        assert!(!log.iter().any(|(target, _)| *target == Target::Fallback));
        assert_eq!(f.router.last_target(), Some(Target::Node(f.child)));
        assert_eq!(
            f.router.take_accepted(),
            vec![EventKind::MouseOver, EventKind::MouseMove]
        );
    }

    #[test]
    fn accepted_hover_sends_mouse_out_to_previous_target() {
        let mut f = fixture();
        f.router
            .process(&PointerInput::mouse_move(OFF_SPHERE), &f.camera, &mut f.listeners);
        assert_eq!(f.router.last_target(), Some(Target::Fallback));

        f.listeners
            .replies
            .insert((f.child, EventKind::MouseOver), Propagation::Stop);
        f.listeners.log.clear();
        f.router
            .process(&PointerInput::mouse_move(ON_SPHERE), &f.camera, &mut f.listeners);
        assert!(
            f.listeners
                .log
                .contains(&(Target::Fallback, EventKind::MouseOut))
        );
    }

    #[test]
    fn failed_hover_falls_back() {
        let mut f = fixture();
        f.router
            .process(&PointerInput::mouse_move(ON_SPHERE), &f.camera, &mut f.listeners);

        let log = &f.listeners.log;
        // The chain is walked to the root before giving up.
        assert!(log.contains(&(Target::Node(f.parent), EventKind::MouseOver)));
        assert!(log.contains(&(Target::Fallback, EventKind::MouseOver)));
        assert!(log.contains(&(Target::Fallback, EventKind::MouseMove)));
        assert_eq!(f.router.last_target(), Some(Target::Fallback));
    }

    #[test]
    fn continue_keeps_the_hit_target() {
        let mut f = fixture();
        f.listeners
            .replies
            .insert((f.parent, EventKind::MouseOver), Propagation::Continue);
        f.router
            .process(&PointerInput::mouse_move(ON_SPHERE), &f.camera, &mut f.listeners);
        assert_eq!(f.router.last_target(), Some(Target::Node(f.child)));
        assert!(
            !f.listeners
                .log
                .iter()
                .any(|(target, _)| *target == Target::Fallback)
        );
    }

    #[test]
    fn drag_captures_the_pressed_target() {
        let mut f = fixture();
        f.listeners
            .replies
            .insert((f.child, EventKind::MouseOver), Propagation::Stop);
        f.router.process(
            &PointerInput::mouse_down(ON_SPHERE, MouseButton::Primary),
            &f.camera,
            &mut f.listeners,
        );
        assert!(f.router.is_dragging());

        f.listeners.log.clear();
        f.router
            .process(&PointerInput::mouse_move(OFF_SPHERE), &f.camera, &mut f.listeners);
        assert_eq!(f.listeners.log[0], (Target::Node(f.child), EventKind::MouseMove));
        assert!(!f.listeners.log.iter().any(|(_, kind)| *kind == EventKind::MouseOver));

        f.router.process(
            &PointerInput::mouse_up(OFF_SPHERE, MouseButton::Primary),
            &f.camera,
            &mut f.listeners,
        );
        assert!(!f.router.is_dragging());
    }

    #[test]
    fn leaving_the_canvas_releases_a_drag() {
        let mut f = fixture();
        f.router.process(
            &PointerInput::mouse_down(OFF_SPHERE, MouseButton::Primary),
            &f.camera,
            &mut f.listeners,
        );
        f.listeners.log.clear();
        f.router
            .process(&PointerInput::mouse_out(OFF_SPHERE), &f.camera, &mut f.listeners);
        assert_eq!(
            f.listeners.log,
            vec![
                (Target::Fallback, EventKind::MouseUp),
                (Target::Fallback, EventKind::MouseOut),
            ]
        );
        assert!(!f.router.is_dragging());
        assert_eq!(f.router.last_target(), None);
    }

    #[test]
    fn last_touch_lifting_ends_the_interaction() {
        let mut f = fixture();
        f.router.process(
            &PointerInput::touch_start(vec![OFF_SPHERE]),
            &f.camera,
            &mut f.listeners,
        );
        assert!(f.router.is_dragging());
        f.listeners.log.clear();
        f.router.process(
            &PointerInput::touch_end(Vec::new(), OFF_SPHERE),
            &f.camera,
            &mut f.listeners,
        );
        assert_eq!(
            f.listeners.log,
            vec![
                (Target::Fallback, EventKind::MouseUp),
                (Target::Fallback, EventKind::TouchLeave),
            ]
        );
    }

    #[test]
    fn accepted_touch_is_delivered_once() {
        let mut f = fixture();
        f.listeners
            .replies
            .insert((f.child, EventKind::TouchStart), Propagation::Stop);
        f.router.process(
            &PointerInput::touch_start(vec![ON_SPHERE]),
            &f.camera,
            &mut f.listeners,
        );
        let starts = f
            .listeners
            .log
            .iter()
            .filter(|entry| **entry == (Target::Node(f.child), EventKind::TouchStart))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(f.router.last_target(), Some(Target::Node(f.child)));
    }
}
