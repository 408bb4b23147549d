use imark_geometry::{
    Camera, Pose, Quat, Rad, Ray, Rotation3, UNIT_X, Vec3, closest_axis_screen_point,
    intersect_plane, normalize_quat, rotate,
};
use imark_protocol::InteractiveMarker as MarkerMsg;
use imark_scene::{NodeId, SceneGraph};
use tracing::debug;

use super::control::{Control, ControlAction};
use super::menu::Menu;
use crate::viewer::event::{Event3d, Propagation};
use crate::viewer::input::MouseButton;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerEventKind {
    MouseDown,
    MouseUp,
    ButtonClick,
    PoseChange,
    MenuSelect { entry_id: u32 },
}

/// User interaction a marker reports to its handle.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerEvent {
    pub kind: MarkerEventKind,
    /// Marker pose in the client's root frame when the event happened.
    pub pose: Pose,
    pub control_name: String,
    pub click_point: Option<Vec3>,
}

/// Snapshot taken when a drag begins. Every drag update is computed from it
/// rather than from the previous update.
#[derive(Clone, Copy, Debug)]
struct DragStart {
    control: usize,
    position: Vec3,
    orientation: Quat,
    position_world: Vec3,
    orientation_world: Quat,
    /// Where the press hit the control.
    origin_world: Option<Vec3>,
    /// Latest server pose that arrived mid-drag.
    buffered: Option<Pose>,
}

#[derive(Clone, Debug)]
pub struct InteractiveMarker {
    name: String,
    node: NodeId,
    controls: Vec<Control>,
    menu: Option<Menu>,
    drag: Option<DragStart>,
    events: Vec<MarkerEvent>,
}

impl InteractiveMarker {
    pub fn new(
        scene: &mut SceneGraph,
        parent: NodeId,
        msg: &MarkerMsg,
        pose: Pose,
    ) -> imark_scene::Result<Self> {
        let node = scene.add_child(parent, msg.name.clone())?;
        scene.set_local_pose(node, pose.normalized())?;
        let controls = msg
            .controls
            .iter()
            .map(|control| Control::new(scene, node, control))
            .collect::<imark_scene::Result<Vec<_>>>()?;
        Ok(Self {
            name: msg.name.clone(),
            node,
            controls,
            menu: Menu::from_entries(&msg.menu_entries),
            drag: None,
            events: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.controls.iter().map(Control::node)
    }

    pub fn menu(&self) -> Option<&Menu> {
        self.menu.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pose(&self, scene: &SceneGraph) -> Pose {
        scene.local_pose(self.node).unwrap_or_default()
    }

    pub fn take_events(&mut self) -> Vec<MarkerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Applies a server pose now, or holds the latest one until the current
    /// drag ends.
    pub fn on_server_set_pose(&mut self, scene: &mut SceneGraph, pose: Pose) {
        let pose = pose.normalized();
        if let Some(drag) = self.drag.as_mut() {
            drag.buffered = Some(pose);
            return;
        }
        self.apply_pose(scene, pose);
    }

    /// Per-frame refresh of every control's orientation frame.
    pub fn update_controls(&mut self, scene: &mut SceneGraph, camera: &Camera) {
        let local = self.pose(scene).orientation;
        let Ok(world) = scene.world_transform(self.node) else {
            return;
        };
        for control in &mut self.controls {
            control.update_orientation(scene, local, world.rotation, camera.orientation);
        }
    }

    /// Runs the event through the control owning `node`.
    pub fn handle_event(
        &mut self,
        scene: &mut SceneGraph,
        node: NodeId,
        event: &Event3d,
    ) -> Propagation {
        let Some(index) = self.controls.iter().position(|control| control.node() == node) else {
            return Propagation::Bubble;
        };
        let actions = self.controls[index].actions_for(event);
        let mut outcome = Propagation::Bubble;
        for action in actions {
            let result = match action {
                ControlAction::StartDrag => self.start_drag(scene, index, event),
                ControlAction::StopDrag => self.stop_drag(scene, event),
                ControlAction::ShowMenu => self.show_menu(index),
                ControlAction::ButtonClick => self.button_click(scene, index, event),
                ControlAction::MoveAxis => self.move_axis(scene, index, event),
                ControlAction::MovePlane => self.move_plane(scene, index, event),
                ControlAction::RotateAxis => self.rotate_axis(scene, index, event),
                ControlAction::Swallow => Propagation::Stop,
            };
            if result == Propagation::Stop {
                outcome = Propagation::Stop;
            }
        }
        outcome
    }

    pub fn start_drag(&mut self, scene: &SceneGraph, control: usize, event: &Event3d) -> Propagation {
        if event.button != MouseButton::Primary || control >= self.controls.len() {
            return Propagation::Bubble;
        }
        let Ok(world) = scene.world_transform(self.node) else {
            return Propagation::Bubble;
        };
        let local = self.pose(scene);
        let origin_world = event.intersection.map(|hit| hit.point);
        self.drag = Some(DragStart {
            control,
            position: local.position,
            orientation: local.orientation,
            position_world: world.translation,
            orientation_world: normalize_quat(world.rotation),
            origin_world,
            buffered: None,
        });
        self.emit(scene, MarkerEventKind::MouseDown, control, origin_world);
        Propagation::Stop
    }

    pub fn stop_drag(&mut self, scene: &mut SceneGraph, event: &Event3d) -> Propagation {
        if event.button != MouseButton::Primary {
            return Propagation::Bubble;
        }
        let Some(drag) = self.drag.take() else {
            return Propagation::Stop;
        };
        if let Some(pose) = drag.buffered {
            self.apply_pose(scene, pose);
        }
        self.emit(scene, MarkerEventKind::MouseUp, drag.control, drag.origin_world);
        Propagation::Stop
    }

    /// Slides the marker along the control axis so it tracks the pointer.
    pub fn move_axis(&mut self, scene: &mut SceneGraph, control: usize, event: &Event3d) -> Propagation {
        let Some((drag, origin)) = self.drag_origin() else {
            return Propagation::Bubble;
        };
        let Some(current) = self.controls.get(control) else {
            return Propagation::Stop;
        };
        let axis = rotate(current.current_orientation(), current.axis());
        let axis_ray = Ray::new(origin, rotate(drag.orientation_world, axis));
        let Some(t) = closest_axis_screen_point(&axis_ray, &event.camera, event.ndc) else {
            debug!(marker = %self.name, "axis is degenerate on screen");
            return Propagation::Stop;
        };
        let position = drag.position + rotate(drag.orientation, axis) * t;
        self.set_position(scene, control, position);
        Propagation::Stop
    }

    /// Moves the marker within the plane normal to the control axis.
    pub fn move_plane(&mut self, scene: &mut SceneGraph, control: usize, event: &Event3d) -> Propagation {
        let Some((drag, origin)) = self.drag_origin() else {
            return Propagation::Bubble;
        };
        let Some(current) = self.controls.get(control) else {
            return Propagation::Stop;
        };
        let normal = rotate(current.current_orientation(), current.axis());
        let normal_world = rotate(drag.orientation_world, normal);
        let Some(hit) = intersect_plane(&event.ray, origin, normal_world) else {
            return Propagation::Stop;
        };
        self.set_position(scene, control, hit - origin + drag.position_world);
        Propagation::Stop
    }

    /// Turns the marker about the control axis by the angle the pointer swept
    /// around it since the press.
    pub fn rotate_axis(&mut self, scene: &mut SceneGraph, control: usize, event: &Event3d) -> Propagation {
        let Some((drag, origin)) = self.drag_origin() else {
            return Propagation::Bubble;
        };
        let Some(current) = self.controls.get(control) else {
            return Propagation::Stop;
        };
        let orientation = current.current_orientation() * current.orientation();
        let normal_world = rotate(drag.orientation_world, rotate(orientation, UNIT_X));

        let Some(hit) = intersect_plane(&event.ray, origin, normal_world) else {
            return Propagation::Stop;
        };
        let Some(center) = intersect_plane(
            &Ray::new(drag.position_world, normal_world),
            origin,
            normal_world,
        ) else {
            return Propagation::Stop;
        };

        let to_axis = normalize_quat(drag.orientation_world * orientation).conjugate();
        let now = rotate(to_axis, hit - center);
        let start = rotate(to_axis, origin - center);
        let angle = start.y.atan2(start.z) - now.y.atan2(now.z);

        let turn = Quat::from_axis_angle(normal_world, Rad(angle));
        self.set_orientation(scene, control, normalize_quat(turn * drag.orientation_world));
        Propagation::Stop
    }

    pub fn button_click(&mut self, scene: &SceneGraph, control: usize, event: &Event3d) -> Propagation {
        let click_point = event.intersection.map(|hit| hit.point);
        self.emit(scene, MarkerEventKind::ButtonClick, control, click_point);
        Propagation::Bubble
    }

    pub fn show_menu(&mut self, control: usize) -> Propagation {
        let (Some(menu), Some(control)) = (self.menu.as_mut(), self.controls.get(control)) else {
            return Propagation::Bubble;
        };
        menu.show(control.name());
        Propagation::Stop
    }

    /// Chooses an entry of the open menu. Returns whether anything was picked.
    pub fn select_menu_entry(&mut self, scene: &SceneGraph, entry_id: u32) -> bool {
        let Some(selection) = self.menu.as_mut().and_then(|menu| menu.select(entry_id)) else {
            return false;
        };
        self.events.push(MarkerEvent {
            kind: MarkerEventKind::MenuSelect {
                entry_id: selection.entry_id,
            },
            pose: self.pose(scene),
            control_name: selection.control_name,
            click_point: None,
        });
        true
    }

    pub fn dispose(&mut self, scene: &mut SceneGraph) {
        if let Err(err) = scene.remove(self.node) {
            debug!(marker = %self.name, %err, "marker node already gone");
        }
        self.drag = None;
    }

    fn drag_origin(&self) -> Option<(DragStart, Vec3)> {
        let drag = self.drag?;
        Some((drag, drag.origin_world?))
    }

    fn set_position(&mut self, scene: &mut SceneGraph, control: usize, position: Vec3) {
        if let Some(node) = scene.get_mut(self.node) {
            node.position = position;
        }
        self.emit(scene, MarkerEventKind::PoseChange, control, None);
    }

    fn set_orientation(&mut self, scene: &mut SceneGraph, control: usize, orientation: Quat) {
        if let Some(node) = scene.get_mut(self.node) {
            node.orientation = orientation;
        }
        self.emit(scene, MarkerEventKind::PoseChange, control, None);
    }

    fn apply_pose(&self, scene: &mut SceneGraph, pose: Pose) {
        if let Err(err) = scene.set_local_pose(self.node, pose) {
            debug!(marker = %self.name, %err, "pose for a detached marker");
        }
    }

    fn emit(
        &mut self,
        scene: &SceneGraph,
        kind: MarkerEventKind,
        control: usize,
        click_point: Option<Vec3>,
    ) {
        let control_name = self
            .controls
            .get(control)
            .map(|control| control.name().to_string())
            .unwrap_or_default();
        self.events.push(MarkerEvent {
            kind,
            pose: self.pose(scene),
            control_name,
            click_point,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::event::{EventKind, fixtures};
    use crate::viewer::ui::Point2;
    use imark_geometry::{InnerSpace, Vec2, ZERO, angle_about, identity_quat};
    use imark_protocol::{InteractionMode, InteractiveMarkerControl, MenuEntry, QuaternionMsg};
    use imark_scene::Hit;
    use std::f64::consts::FRAC_PI_2;

    fn control(name: &str, mode: InteractionMode, orientation: Quat) -> InteractiveMarkerControl {
        InteractiveMarkerControl {
            name: name.to_string(),
            interaction_mode: mode.into(),
            orientation: QuaternionMsg::from(orientation),
            ..InteractiveMarkerControl::default()
        }
    }

    fn marker(controls: Vec<InteractiveMarkerControl>) -> (SceneGraph, InteractiveMarker) {
        let mut scene = SceneGraph::new();
        let msg = MarkerMsg {
            name: "m".to_string(),
            controls,
            menu_entries: vec![MenuEntry {
                id: 1,
                title: "Reset".to_string(),
                ..MenuEntry::default()
            }],
            ..MarkerMsg::default()
        };
        let root = scene.root();
        let marker = InteractiveMarker::new(&mut scene, root, &msg, Pose::identity()).expect("marker");
        (scene, marker)
    }

    fn camera_at(position: Vec3) -> Camera {
        let mut camera = fixtures::camera();
        camera.aspect = 4.0 / 3.0;
        camera.position = position;
        camera.look_at(ZERO);
        camera
    }

    fn press(marker: &InteractiveMarker, camera: &Camera, point: Vec3) -> Event3d {
        let mut event = fixtures::at_ndc(EventKind::MouseDown, Point2::default(), camera, Vec2::new(0.0, 0.0));
        event.intersection = Some(Hit {
            node: marker.controls()[0].node(),
            point,
            distance: (point - camera.position).magnitude(),
        });
        event
    }

    fn drag_to(camera: &Camera, point: Vec3) -> Event3d {
        let ndc = camera.project(point);
        fixtures::at_ndc(EventKind::MouseMove, Point2::new(1.0, 1.0), camera, Vec2::new(ndc.x, ndc.y))
    }

    #[test]
    fn server_poses_wait_for_the_drag_to_end() {
        let (mut scene, mut marker) = marker(vec![control("move_x", InteractionMode::MoveAxis, identity_quat())]);
        let camera = camera_at(Vec3::new(0.0, -10.0, 2.0));
        marker.start_drag(&scene, 0, &press(&marker, &camera, ZERO));

        let first = Pose::new(Vec3::new(1.0, 0.0, 0.0), identity_quat());
        let latest = Pose::new(Vec3::new(2.0, 0.0, 0.0), identity_quat());
        marker.on_server_set_pose(&mut scene, first);
        marker.on_server_set_pose(&mut scene, latest);
        assert_eq!(marker.pose(&scene).position, ZERO);

        let release = fixtures::event(EventKind::MouseUp, Point2::default());
        assert_eq!(marker.stop_drag(&mut scene, &release), Propagation::Stop);
        assert_eq!(marker.pose(&scene).position, latest.position);

        let kinds: Vec<_> = marker.take_events().into_iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![MarkerEventKind::MouseDown, MarkerEventKind::MouseUp]);

        marker.on_server_set_pose(&mut scene, first);
        assert_eq!(marker.pose(&scene).position, first.position);
    }

    #[test]
    fn axis_drag_tracks_the_pointer_from_the_press() {
        let (mut scene, mut marker) = marker(vec![control("move_x", InteractionMode::MoveAxis, identity_quat())]);
        let camera = camera_at(Vec3::new(0.0, -10.0, 2.0));
        marker.start_drag(&scene, 0, &press(&marker, &camera, ZERO));

        let to = drag_to(&camera, Vec3::new(2.0, 0.0, 0.0));
        marker.move_axis(&mut scene, 0, &to);
        let once = marker.pose(&scene).position;
        assert!((once - Vec3::new(2.0, 0.0, 0.0)).magnitude() < 1.0e-6);

        // Same pointer, same result: updates do not accumulate.
        marker.move_axis(&mut scene, 0, &to);
        assert!((marker.pose(&scene).position - once).magnitude() < 1.0e-12);

        let changes = marker
            .take_events()
            .into_iter()
            .filter(|event| event.kind == MarkerEventKind::PoseChange)
            .count();
        assert_eq!(changes, 2);
    }

    #[test]
    fn moves_without_a_drag_are_ignored() {
        let (mut scene, mut marker) = marker(vec![control("move_x", InteractionMode::MoveAxis, identity_quat())]);
        let camera = camera_at(Vec3::new(0.0, -10.0, 2.0));
        let to = drag_to(&camera, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(marker.move_axis(&mut scene, 0, &to), Propagation::Bubble);
        assert!(marker.take_events().is_empty());
    }

    #[test]
    fn plane_drag_follows_the_pointer_in_the_plane() {
        let (mut scene, mut marker) = marker(vec![control("move_yz", InteractionMode::MovePlane, identity_quat())]);
        let camera = camera_at(Vec3::new(5.0, 0.0, 0.0));
        marker.start_drag(&scene, 0, &press(&marker, &camera, Vec3::new(0.0, 0.5, 0.0)));

        marker.move_plane(&mut scene, 0, &drag_to(&camera, Vec3::new(0.0, 1.5, 0.5)));
        let position = marker.pose(&scene).position;
        assert!((position - Vec3::new(0.0, 1.0, 0.5)).magnitude() < 1.0e-6);
    }

    #[test]
    fn plane_drag_adds_the_world_start_position_to_the_local_pose() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let frame = scene.add_child(root, "frame").expect("frame");
        scene
            .set_local_pose(frame, Pose::new(Vec3::new(10.0, 0.0, 0.0), identity_quat()))
            .expect("frame pose");
        let msg = MarkerMsg {
            name: "m".to_string(),
            controls: vec![control("move_yz", InteractionMode::MovePlane, identity_quat())],
            ..MarkerMsg::default()
        };
        let mut marker = InteractiveMarker::new(&mut scene, frame, &msg, Pose::identity()).expect("marker");

        let mut camera = fixtures::camera();
        camera.position = Vec3::new(15.0, 0.0, 0.0);
        camera.look_at(Vec3::new(10.0, 0.0, 0.0));
        marker.start_drag(&scene, 0, &press(&marker, &camera, Vec3::new(10.0, 0.5, 0.0)));
        marker.move_plane(&mut scene, 0, &drag_to(&camera, Vec3::new(10.0, 1.5, 0.5)));

        // The world offset of the press lands in the local pose unchanged, so
        // the parent translation is counted twice.
        let local = marker.pose(&scene).position;
        assert!((local - Vec3::new(10.0, 1.0, 0.5)).magnitude() < 1.0e-6);
    }

    fn rotate_by_drag(orientation: Quat) -> Quat {
        let (mut scene, mut marker) = marker(vec![control("ring", InteractionMode::RotateAxis, orientation)]);
        let camera = camera_at(Vec3::new(5.0, 0.0, 0.0));
        marker.start_drag(&scene, 0, &press(&marker, &camera, Vec3::new(0.0, 1.0, 0.0)));
        marker.rotate_axis(&mut scene, 0, &drag_to(&camera, Vec3::new(0.0, 0.0, 1.0)));
        marker.pose(&scene).orientation
    }

    #[test]
    fn rotation_follows_the_swept_angle() {
        let turned = rotate_by_drag(identity_quat());
        assert!((angle_about(turned, UNIT_X) - FRAC_PI_2).abs() < 1.0e-6);
        assert!((rotate(turned, Vec3::new(0.0, 1.0, 0.0)) - Vec3::new(0.0, 0.0, 1.0)).magnitude() < 1.0e-6);
    }

    #[test]
    fn flipped_control_axis_gives_the_same_world_rotation() {
        let flipped = Quat::from_angle_z(Rad(std::f64::consts::PI));
        let a = rotate_by_drag(identity_quat());
        let b = rotate_by_drag(flipped);
        // Equal up to quaternion sign.
        assert!(a.s * b.s + a.v.dot(b.v) > 1.0 - 1.0e-9);
        // Measured about the control's own axis the angle is negated.
        assert!((angle_about(b, -UNIT_X) + FRAC_PI_2).abs() < 1.0e-6);
    }

    #[test]
    fn only_the_primary_button_drags() {
        let (scene, mut marker) = marker(vec![control("move_x", InteractionMode::MoveAxis, identity_quat())]);
        let camera = camera_at(Vec3::new(0.0, -10.0, 2.0));
        let mut event = press(&marker, &camera, ZERO);
        event.button = MouseButton::Secondary;
        assert_eq!(marker.start_drag(&scene, 0, &event), Propagation::Bubble);
        assert!(!marker.is_dragging());
    }

    #[test]
    fn menu_selection_reports_the_entry() {
        let (scene, mut marker) = marker(vec![control("ring", InteractionMode::Menu, identity_quat())]);
        assert!(!marker.select_menu_entry(&scene, 1));
        assert_eq!(marker.show_menu(0), Propagation::Stop);
        assert!(marker.select_menu_entry(&scene, 1));
        let events = marker.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MarkerEventKind::MenuSelect { entry_id: 1 });
        assert_eq!(events[0].control_name, "ring");
    }
}
