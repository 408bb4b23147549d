use serde::{Deserialize, Serialize};

/// A position in device pixels, origin at the top-left of the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Mean of a set of points; `None` for an empty set.
    pub fn average(points: &[Point2]) -> Option<Point2> {
        if points.is_empty() {
            return None;
        }
        let count = points.len() as f32;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point2::new(sx / count, sy / count))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min: Point2,
    pub max: Point2,
}

impl Rect {
    pub fn from_min_size(min: Point2, size: Vec2) -> Self {
        Self {
            min,
            max: Point2::new(min.x + size.x, min.y + size.y),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    pub fn contains(&self, pos: Point2) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }

    /// Maps a device position to normalized device coordinates, +y up.
    pub fn to_ndc(&self, pos: Point2) -> imark_geometry::Vec2 {
        let width = f64::from(self.width().max(f32::EPSILON));
        let height = f64::from(self.height().max(f32::EPSILON));
        let x = f64::from(pos.x - self.min.x) / width * 2.0 - 1.0;
        let y = -(f64::from(pos.y - self.min.y) / height) * 2.0 + 1.0;
        imark_geometry::Vec2::new(x, y)
    }

    pub fn to_device(&self, ndc: imark_geometry::Vec2) -> Point2 {
        let x = (ndc.x + 1.0) * 0.5 * f64::from(self.width());
        let y = (1.0 - ndc.y) * 0.5 * f64::from(self.height());
        Point2::new(self.min.x + x as f32, self.min.y + y as f32)
    }
}

impl std::ops::Add<Vec2> for Point2 {
    type Output = Point2;

    fn add(self, rhs: Vec2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub<Point2> for Point2 {
    type Output = Vec2;

    fn sub(self, rhs: Point2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Sub<Vec2> for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

pub const fn pos2(x: f32, y: f32) -> Point2 {
    Point2::new(x, y)
}

pub const fn vec2(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, y)
}
