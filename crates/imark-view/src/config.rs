use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Viewer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub orbit: OrbitConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
}

/// Camera and canvas setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Canvas width in device pixels
    #[serde(default = "default_width")]
    pub width: f32,
    /// Canvas height in device pixels
    #[serde(default = "default_height")]
    pub height: f32,
    /// Vertical field of view in degrees
    #[serde(default = "default_fov")]
    pub fov_deg: f64,
    #[serde(default = "default_near")]
    pub near: f64,
    #[serde(default = "default_far")]
    pub far: f64,
    /// Initial camera position
    #[serde(default = "default_camera_position")]
    pub position: [f64; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fov_deg: default_fov(),
            near: default_near(),
            far: default_far(),
            position: default_camera_position(),
        }
    }
}

/// Orbit camera controller tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitConfig {
    /// Point the camera orbits around
    #[serde(default)]
    pub center: [f64; 3],
    #[serde(default = "default_speed")]
    pub zoom_speed: f64,
    #[serde(default = "default_speed")]
    pub rotate_speed: f64,
    /// Horizontal drag distance that turns the camera once around
    #[serde(default = "default_pixels_per_round")]
    pub pixels_per_round: f64,
    /// Squared pinch distance change below which two-finger input pans
    #[serde(default = "default_touch_threshold")]
    pub touch_move_threshold: f32,
    #[serde(default = "default_true")]
    pub user_zoom: bool,
    #[serde(default = "default_true")]
    pub user_rotate: bool,
    #[serde(default)]
    pub auto_rotate: bool,
    #[serde(default = "default_speed")]
    pub auto_rotate_speed: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            zoom_speed: default_speed(),
            rotate_speed: default_speed(),
            pixels_per_round: default_pixels_per_round(),
            touch_move_threshold: default_touch_threshold(),
            user_zoom: true,
            user_rotate: true,
            auto_rotate: false,
            auto_rotate_speed: default_speed(),
        }
    }
}

/// Interactive marker client setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Server topic the client subscribes to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Identifies this client in feedback messages
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Frame every marker pose is resolved into
    #[serde(default = "default_fixed_frame")]
    pub fixed_frame: String,
    /// Delay between pose feedback resends while a drag is held
    #[serde(default = "default_resend_ms")]
    pub resend_interval_ms: u64,
}

impl MarkerConfig {
    pub fn resend_interval(&self) -> Duration {
        Duration::from_millis(self.resend_interval_ms)
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            client_id: default_client_id(),
            fixed_frame: default_fixed_frame(),
            resend_interval_ms: default_resend_ms(),
        }
    }
}

fn default_width() -> f32 {
    800.0
}

fn default_height() -> f32 {
    600.0
}

fn default_fov() -> f64 {
    40.0
}

fn default_near() -> f64 {
    0.01
}

fn default_far() -> f64 {
    1000.0
}

fn default_camera_position() -> [f64; 3] {
    [3.0, 3.0, 3.0]
}

fn default_speed() -> f64 {
    1.0
}

fn default_pixels_per_round() -> f64 {
    1800.0
}

fn default_touch_threshold() -> f32 {
    10.0
}

fn default_true() -> bool {
    true
}

fn default_topic() -> String {
    "/basic_controls".to_string()
}

fn default_client_id() -> String {
    "imark".to_string()
}

fn default_fixed_frame() -> String {
    "base_link".to_string()
}

fn default_resend_ms() -> u64 {
    250
}

impl ViewerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?;
        info!("Configuration loaded from: {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
