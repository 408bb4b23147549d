use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Guid(Uuid);

impl Guid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thresholds below which a geometric query is treated as degenerate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Tolerance {
    /// Minimum `|direction · normal|` for a ray to hit a plane.
    pub ray_precision: f64,
    /// Minimum denominator magnitude when solving for the closest point of two rays.
    pub ray_pair: f64,
    /// Minimum squared length of an axis projected into device space.
    pub screen_axis: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            ray_precision: 1.0e-4,
            ray_pair: 1.0e-4,
            screen_axis: 1.0e-12,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidParameter(format!("{name} must be finite")));
    }
    Ok(())
}
