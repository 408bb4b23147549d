use std::f64::consts::PI;

use imark_geometry::{Camera, InnerSpace, Ray, UNIT_Z, Vec3, intersect_plane, rotate};

use super::event::{Event3d, EventKind, Propagation};
use super::input::MouseButton;
use super::ui::{Point2, Vec2};
use crate::config::OrbitConfig;

const PHI_EPS: f64 = 1.0e-6;
const ZOOM_BASE: f64 = 0.95;
const MOVE_EPS: f64 = 1.0e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OrbitState {
    None,
    Rotate,
    Zoom,
    Move,
}

#[derive(Clone, Copy, Debug)]
struct MoveStart {
    center: Vec3,
    position: Vec3,
    normal: Vec3,
    /// Camera-relative vector to where the pointer ray met the view plane.
    intersection: Option<Vec3>,
}

/// Spherical-coordinate camera controller around a movable center, Z up.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub center: Vec3,
    config: OrbitConfig,
    state: OrbitState,
    rotate_start: Point2,
    zoom_start: Point2,
    move_start: Option<MoveStart>,
    touch_start: [Point2; 2],
    theta_delta: f64,
    phi_delta: f64,
    scale: f64,
    last_position: Option<Vec3>,
    changes: u64,
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        let [x, y, z] = config.center;
        Self {
            center: Vec3::new(x, y, z),
            config,
            state: OrbitState::None,
            rotate_start: Point2::default(),
            zoom_start: Point2::default(),
            move_start: None,
            touch_start: [Point2::default(); 2],
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            last_position: None,
            changes: 0,
        }
    }

    /// Number of updates that moved the camera.
    pub fn change_count(&self) -> u64 {
        self.changes
    }

    pub fn is_idle(&self) -> bool {
        self.state == OrbitState::None
    }

    pub fn radius(&self, camera: &Camera) -> f64 {
        (camera.position - self.center).magnitude()
    }

    pub fn rotate_left(&mut self, angle: f64) {
        self.theta_delta -= angle;
    }

    pub fn rotate_right(&mut self, angle: f64) {
        self.theta_delta += angle;
    }

    pub fn rotate_up(&mut self, angle: f64) {
        self.phi_delta -= angle;
    }

    pub fn rotate_down(&mut self, angle: f64) {
        self.phi_delta += angle;
    }

    /// Shrinks the orbit radius by `factor` on the next update, by default
    /// `0.95^zoom_speed`.
    pub fn zoom_in(&mut self, factor: Option<f64>) {
        let factor = factor.unwrap_or_else(|| self.zoom_factor());
        self.scale *= factor;
    }

    pub fn zoom_out(&mut self, factor: Option<f64>) {
        let factor = factor.unwrap_or_else(|| self.zoom_factor());
        self.scale /= factor;
    }

    fn zoom_factor(&self) -> f64 {
        ZOOM_BASE.powf(self.config.zoom_speed)
    }

    pub fn handle(&mut self, camera: &mut Camera, event: &Event3d) -> Propagation {
        match event.kind {
            EventKind::MouseDown => self.on_mouse_down(camera, event),
            EventKind::MouseMove => self.on_mouse_move(camera, event),
            EventKind::MouseUp => self.state = OrbitState::None,
            EventKind::Wheel => self.on_wheel(event),
            EventKind::TouchStart => self.on_touch_start(camera, event),
            EventKind::TouchMove => self.on_touch_move(camera, event),
            EventKind::TouchEnd => self.on_touch_end(event),
            _ => {}
        }
        Propagation::Bubble
    }

    /// Applies pending rotation and zoom, then aims the camera at the center.
    /// Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - self.center;
        let mut theta = offset.y.atan2(offset.x);
        let mut phi = (offset.x * offset.x + offset.y * offset.y)
            .sqrt()
            .atan2(offset.z);

        if self.config.auto_rotate && self.state == OrbitState::None {
            self.rotate_left(2.0 * PI / 60.0 / 60.0 * self.config.auto_rotate_speed);
        }

        theta += self.theta_delta;
        phi = (phi + self.phi_delta).clamp(PHI_EPS, PI - PHI_EPS);
        let radius = offset.magnitude() * self.scale;

        let offset = Vec3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
        );
        camera.position = self.center + offset;
        camera.up = UNIT_Z;
        camera.look_at(self.center);

        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.scale = 1.0;

        let moved = self
            .last_position
            .is_none_or(|last| (last - camera.position).magnitude() > MOVE_EPS);
        if moved {
            self.last_position = Some(camera.position);
            self.changes += 1;
        }
        moved
    }

    fn on_mouse_down(&mut self, camera: &Camera, event: &Event3d) {
        match event.button {
            MouseButton::Primary => {
                self.state = OrbitState::Rotate;
                self.rotate_start = event.position;
            }
            MouseButton::Middle => {
                self.state = OrbitState::Move;
                self.begin_move(camera, &event.ray);
            }
            MouseButton::Secondary => {
                self.state = OrbitState::Zoom;
                self.zoom_start = event.position;
            }
        }
    }

    fn on_mouse_move(&mut self, camera: &mut Camera, event: &Event3d) {
        match self.state {
            OrbitState::Rotate => self.drag_rotate(event.position),
            OrbitState::Zoom => {
                let delta = event.position - self.zoom_start;
                if self.config.user_zoom {
                    if delta.y > 0.0 {
                        self.zoom_in(None);
                    } else {
                        self.zoom_out(None);
                    }
                }
                self.zoom_start = event.position;
            }
            OrbitState::Move => self.drag_move(camera, &event.ray),
            OrbitState::None => {}
        }
    }

    fn on_wheel(&mut self, event: &Event3d) {
        if !self.config.user_zoom || event.wheel_delta == 0.0 {
            return;
        }
        if event.wheel_delta > 0.0 {
            self.zoom_in(None);
        } else {
            self.zoom_out(None);
        }
    }

    fn on_touch_start(&mut self, camera: &Camera, event: &Event3d) {
        match event.touches.as_slice() {
            [touch] => {
                self.state = OrbitState::Rotate;
                self.rotate_start = *touch;
            }
            [first, second, ..] => {
                self.state = OrbitState::None;
                self.begin_move(camera, &event.ray);
                self.touch_start = [*first, *second];
            }
            [] => {}
        }
    }

    fn on_touch_move(&mut self, camera: &mut Camera, event: &Event3d) {
        match event.touches.as_slice() {
            [touch] => {
                if self.state == OrbitState::Rotate {
                    self.drag_rotate(*touch);
                }
            }
            [first, second, ..] => {
                let moved = [*first - self.touch_start[0], *second - self.touch_start[1]];
                let threshold = self.config.touch_move_threshold;
                if moved[0].length_sq() > threshold && moved[1].length_sq() > threshold {
                    self.touch_start = [*first, *second];
                    let agreement = moved[0].dot(moved[1]);
                    if agreement > 0.0 && self.state != OrbitState::Zoom {
                        self.state = OrbitState::Move;
                    } else if agreement < 0.0 && self.state != OrbitState::Move {
                        self.state = OrbitState::Zoom;
                    }
                    if self.state == OrbitState::Zoom {
                        self.pinch(moved, self.touch_start[0] - self.touch_start[1]);
                    }
                }
                if self.state == OrbitState::Move {
                    self.drag_move(camera, &event.ray);
                }
            }
            [] => {}
        }
    }

    fn on_touch_end(&mut self, event: &Event3d) {
        match event.touches.as_slice() {
            [touch] => {
                self.state = OrbitState::Rotate;
                self.rotate_start = *touch;
            }
            _ => self.state = OrbitState::None,
        }
    }

    fn pinch(&mut self, moved: [Vec2; 2], spread: Vec2) {
        if !self.config.user_zoom {
            return;
        }
        let (a, b) = (moved[0].dot(spread), moved[1].dot(spread));
        if a > 0.0 && b < 0.0 {
            self.zoom_in(None);
        } else if a < 0.0 && b > 0.0 {
            self.zoom_out(None);
        }
    }

    fn drag_rotate(&mut self, position: Point2) {
        let delta = position - self.rotate_start;
        if self.config.user_rotate {
            let per_pixel = 2.0 * PI / self.config.pixels_per_round * self.config.rotate_speed;
            self.rotate_left(per_pixel * f64::from(delta.x));
            self.rotate_up(per_pixel * f64::from(delta.y));
        }
        self.rotate_start = position;
    }

    fn begin_move(&mut self, camera: &Camera, ray: &Ray) {
        let normal = rotate(camera.orientation, UNIT_Z);
        self.move_start = Some(MoveStart {
            center: self.center,
            position: camera.position,
            normal,
            intersection: view_plane_offset(ray, self.center, normal),
        });
    }

    fn drag_move(&mut self, camera: &mut Camera, ray: &Ray) {
        let Some(start) = self.move_start else {
            return;
        };
        let (Some(from), Some(to)) = (
            start.intersection,
            view_plane_offset(ray, self.center, start.normal),
        ) else {
            return;
        };
        let delta = from - to;
        self.center = start.center + delta;
        camera.position = start.position + delta;
        self.update(camera);
    }
}

/// Where `ray` meets the plane, relative to the ray origin.
fn view_plane_offset(ray: &Ray, origin: Vec3, normal: Vec3) -> Option<Vec3> {
    intersect_plane(ray, origin, normal).map(|hit| hit - ray.origin)
}
