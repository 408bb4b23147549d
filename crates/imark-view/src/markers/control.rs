use std::f64::consts::FRAC_PI_2;

use imark_geometry::{Pose, Quat, Rad, Rotation3, UNIT_X, Vec3, identity_quat, normalize_quat, rotate};
use imark_protocol::{
    InteractionMode, InteractiveMarkerControl, OrientationMode, VisualMarker, marker_type,
};
use imark_scene::{HitShape, NodeId, SceneGraph};
use tracing::{debug, warn};

use crate::viewer::event::{Event3d, EventKind};
use crate::viewer::ui::Point2;

/// Work a control asks of its marker in response to one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ControlAction {
    StartDrag,
    StopDrag,
    ShowMenu,
    ButtonClick,
    MoveAxis,
    MovePlane,
    RotateAxis,
    /// Claim the event without doing anything.
    Swallow,
}

/// Rotation taking the camera's look-down-Z frame onto an X-forward, Z-up one.
fn view_facing_correction() -> Quat {
    Quat::from_angle_x(Rad(-FRAC_PI_2)) * Quat::from_angle_z(Rad(FRAC_PI_2))
}

#[derive(Clone, Debug)]
pub struct Control {
    name: String,
    node: NodeId,
    interaction: InteractionMode,
    /// `None` when the server sent a mode this client does not know.
    orientation_mode: Option<OrientationMode>,
    independent_orientation: bool,
    always_visible: bool,
    orientation: Quat,
    axis: Vec3,
    current_orientation: Quat,
    press_position: Option<Point2>,
}

impl Control {
    /// Creates the control node under `marker_node` with one hit volume per
    /// supported visual.
    pub fn new(
        scene: &mut SceneGraph,
        marker_node: NodeId,
        msg: &InteractiveMarkerControl,
    ) -> imark_scene::Result<Self> {
        let interaction = msg.interaction().unwrap_or_else(|err| {
            warn!(control = %msg.name, %err, "ignoring interaction of control");
            InteractionMode::None
        });
        let orientation_mode = match msg.orientation_behavior() {
            Ok(mode) => Some(mode),
            Err(err) => {
                warn!(control = %msg.name, %err, "control orientation will not be updated");
                None
            }
        };

        let node = scene.add_child(marker_node, msg.name.clone())?;
        for visual in &msg.markers {
            add_visual(scene, node, visual)?;
        }

        let orientation = normalize_quat(msg.orientation.into());
        Ok(Self {
            name: msg.name.clone(),
            node,
            interaction,
            orientation_mode,
            independent_orientation: msg.independent_marker_orientation,
            always_visible: msg.always_visible,
            orientation,
            axis: rotate(orientation, UNIT_X),
            current_orientation: identity_quat(),
            press_position: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn interaction(&self) -> InteractionMode {
        self.interaction
    }

    pub fn always_visible(&self) -> bool {
        self.always_visible
    }

    /// Declared orientation, normalized.
    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Interaction axis in the control frame: the declared orientation's +X.
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    /// Orientation of the control frame relative to its marker, as of the
    /// last frame update.
    pub fn current_orientation(&self) -> Quat {
        self.current_orientation
    }

    /// Recomputes the control frame for this render frame and writes it to
    /// the control node where the mode says the visuals follow it.
    pub fn update_orientation(
        &mut self,
        scene: &mut SceneGraph,
        marker_local: Quat,
        marker_world: Quat,
        camera_orientation: Quat,
    ) {
        let Some(mode) = self.orientation_mode else {
            return;
        };
        let (current, visual) = match mode {
            OrientationMode::Inherit => {
                let own = scene
                    .get(self.node)
                    .map_or_else(identity_quat, |node| node.orientation);
                (normalize_quat(own), None)
            }
            OrientationMode::Fixed => {
                let fixed = normalize_quat(marker_local).conjugate();
                (fixed, Some(fixed))
            }
            OrientationMode::ViewFacing => {
                let facing = normalize_quat(
                    normalize_quat(marker_world).conjugate()
                        * camera_orientation
                        * view_facing_correction(),
                );
                (facing, (!self.independent_orientation).then_some(facing))
            }
        };
        self.current_orientation = current;
        if let Some(rotation) = visual {
            if let Some(node) = scene.get_mut(self.node) {
                node.orientation = rotation;
            }
        }
    }

    /// Maps an event onto marker work. Touch input is folded into the
    /// equivalent single-pointer events.
    pub(crate) fn actions_for(&mut self, event: &Event3d) -> Vec<ControlAction> {
        if !self.interaction.is_interactive() {
            return Vec::new();
        }
        match event.kind {
            EventKind::MouseDown => {
                self.press_position = Some(event.position);
                vec![ControlAction::StartDrag]
            }
            EventKind::MouseUp => {
                let mut actions = vec![ControlAction::StopDrag];
                if self.press_position.take() == Some(event.position) {
                    actions.push(ControlAction::ShowMenu);
                }
                actions
            }
            EventKind::ContextMenu => vec![ControlAction::ShowMenu],
            EventKind::MouseOver | EventKind::MouseOut => vec![ControlAction::Swallow],
            EventKind::Click => match self.interaction {
                InteractionMode::Button => vec![ControlAction::ButtonClick, ControlAction::Swallow],
                InteractionMode::Menu => vec![ControlAction::ShowMenu, ControlAction::Swallow],
                _ => vec![ControlAction::Swallow],
            },
            EventKind::MouseMove => match self.interaction {
                InteractionMode::MoveAxis => vec![ControlAction::MoveAxis],
                InteractionMode::MovePlane | InteractionMode::MoveRotate => {
                    vec![ControlAction::MovePlane]
                }
                InteractionMode::RotateAxis => vec![ControlAction::RotateAxis],
                _ => Vec::new(),
            },
            EventKind::TouchStart if event.touch_count() == 1 => {
                self.actions_for(&event.with_kind(EventKind::MouseDown))
            }
            EventKind::TouchMove if event.touch_count() == 1 => {
                self.actions_for(&event.with_kind(EventKind::MouseMove))
            }
            EventKind::TouchEnd if event.touch_count() == 0 => {
                let mut actions = self.actions_for(&event.with_kind(EventKind::MouseUp));
                actions.extend(self.actions_for(&event.with_kind(EventKind::Click)));
                actions
            }
            _ => Vec::new(),
        }
    }
}

fn add_visual(
    scene: &mut SceneGraph,
    control_node: NodeId,
    visual: &VisualMarker,
) -> imark_scene::Result<()> {
    let pose: Pose = Pose::from(visual.pose).normalized();
    let scale: Vec3 = visual.scale.into();
    let largest = scale.x.max(scale.y).max(scale.z);
    if largest <= 0.0 {
        debug!(kind = visual.kind, "visual has no extent and cannot be picked");
        return Ok(());
    }

    let (shape, center) = match visual.kind {
        marker_type::SPHERE => (HitShape::Sphere { radius: largest * 0.5 }, pose.position),
        marker_type::CUBE | marker_type::CYLINDER => (
            HitShape::Cuboid {
                half_extents: scale * 0.5,
            },
            pose.position,
        ),
        // Arrows start at the pose and extend along +X.
        marker_type::ARROW => (
            HitShape::Cuboid {
                half_extents: scale * 0.5,
            },
            pose.position + rotate(pose.orientation, Vec3::new(scale.x * 0.5, 0.0, 0.0)),
        ),
        other => {
            debug!(kind = other, "visual kind has no hit volume");
            return Ok(());
        }
    };

    let name = if visual.ns.is_empty() {
        format!("visual_{}", visual.id)
    } else {
        format!("{}_{}", visual.ns, visual.id)
    };
    let node = scene.add_child(control_node, name)?;
    scene.set_local_pose(node, Pose::new(center, pose.orientation))?;
    scene.set_shape(node, Some(shape))?;
    Ok(())
}
