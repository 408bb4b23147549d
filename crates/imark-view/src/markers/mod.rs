mod client;
mod control;
mod handle;
mod marker;
mod menu;
mod tf;
mod timer;

pub use client::{FeedbackPublisher, InteractiveMarkerClient};
pub use control::Control;
pub use handle::MarkerHandle;
pub use marker::{InteractiveMarker, MarkerEvent, MarkerEventKind};
pub use menu::{Menu, MenuItem, MenuSelection};
pub use tf::TfClient;
pub use timer::{TimerId, TimerQueue};
