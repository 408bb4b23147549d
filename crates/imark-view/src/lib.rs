pub mod config;
pub mod markers;
pub mod viewer;

pub use config::{CameraConfig, MarkerConfig, OrbitConfig, ViewerConfig};
pub use markers::{
    Control, FeedbackPublisher, InteractiveMarker, InteractiveMarkerClient, MarkerEvent,
    MarkerEventKind, MarkerHandle, Menu, MenuItem, TfClient, TimerId, TimerQueue,
};
pub use viewer::{
    Event3d, EventKind, EventListeners, HeadlessSink, InputKind, MouseButton, MouseRouter,
    NotifyResult, OrbitControls, Point2, PointerInput, Propagation, Rect, RenderSink, Target,
    Viewer,
};
