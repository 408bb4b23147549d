use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use imark_geometry::Vec3;
use imark_protocol::{
    FrameTransform, InteractiveMarkerFeedback, InteractiveMarkerInit, InteractiveMarkerPose,
    InteractiveMarkerUpdate, UpdateType, from_json, to_json,
};
use imark_view::{
    FeedbackPublisher, HeadlessSink, InputKind, MouseButton, Point2, PointerInput, Viewer,
    ViewerConfig,
};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "imark")]
#[command(about = "Headless interactive marker client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Replay(ReplayArgs),
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ReplayArgs {
    #[arg(long)]
    scenario: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    #[arg(long)]
    update: PathBuf,
}

/// Scripted session: server traffic, pointer input and clock ticks in order.
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    topic: Option<String>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Init(InteractiveMarkerInit),
    Update(InteractiveMarkerUpdate),
    Pose(InteractiveMarkerPose),
    Transform(FrameTransform),
    Pointer(PointerStep),
    Menu { marker: String, entry_id: u32 },
    Resize { width: f32, height: f32 },
    Advance { ms: u64 },
}

#[derive(Debug, Deserialize)]
struct PointerStep {
    kind: InputKind,
    /// Device position; ignored when `at` names a world point.
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    at: Option<[f64; 3]>,
    #[serde(default)]
    button: MouseButton,
    #[serde(default)]
    delta: f32,
    #[serde(default)]
    touches: Vec<Point2>,
}

impl PointerStep {
    fn input(&self, viewer: &Viewer) -> Result<PointerInput> {
        let position = match self.at {
            Some([x, y, z]) => viewer
                .screen_point(Vec3::new(x, y, z))
                .with_context(|| format!("world point {:?} is not in view", self.at))?,
            None => Point2::new(self.x, self.y),
        };
        let touches = self.touches.clone();
        Ok(match self.kind {
            InputKind::MouseDown => PointerInput::mouse_down(position, self.button),
            InputKind::MouseUp => PointerInput::mouse_up(position, self.button),
            InputKind::MouseMove => PointerInput::mouse_move(position),
            InputKind::Click => PointerInput::click(position, self.button),
            InputKind::ContextMenu => PointerInput::context_menu(position),
            InputKind::Wheel => PointerInput::wheel(position, self.delta),
            InputKind::MouseOut => PointerInput::mouse_out(position),
            InputKind::TouchStart => PointerInput::touch_start(touches),
            InputKind::TouchMove => PointerInput::touch_move(touches),
            InputKind::TouchEnd => PointerInput::touch_end(touches, position),
            InputKind::TouchLeave => PointerInput::touch_leave(position),
        })
    }
}

/// Writes each feedback message to stdout as one JSON line.
struct JsonLines {
    sent: usize,
}

impl FeedbackPublisher for JsonLines {
    fn publish(&mut self, topic: &str, feedback: InteractiveMarkerFeedback) {
        match to_json(&feedback) {
            Ok(line) => {
                self.sent += 1;
                println!("{line}");
            }
            Err(err) => warn!(%topic, error = %err, "feedback could not be encoded"),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay(args) => replay(args),
        Command::Inspect(args) => inspect(args),
    }
}

fn replay(args: ReplayArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ViewerConfig::load_from_file(path)?,
        None => ViewerConfig::default(),
    };
    let scenario: Scenario = read_json(&args.scenario)?;
    let mut viewer = Viewer::new(&config).context("failed to set up the viewer")?;
    let topic = scenario.topic.as_deref().unwrap_or(&config.markers.topic);
    let topics = viewer.subscribe(topic);
    info!(feedback = %topics.feedback, steps = scenario.steps.len(), "replaying scenario");

    let mut sink = HeadlessSink::default();
    let mut publisher = JsonLines { sent: 0 };
    let mut now = Duration::ZERO;
    viewer.frame(now, &mut sink);

    for (index, step) in scenario.steps.iter().enumerate() {
        match step {
            Step::Init(init) => viewer.process_init(init),
            Step::Update(update) => viewer.process_update(update),
            Step::Pose(pose) => viewer.process_update(&InteractiveMarkerUpdate {
                poses: vec![pose.clone()],
                ..InteractiveMarkerUpdate::default()
            }),
            Step::Transform(frame) => {
                viewer.process_transform(&frame.frame_id, frame.transform.into())
            }
            Step::Pointer(pointer) => {
                let input = pointer
                    .input(&viewer)
                    .with_context(|| format!("step {index}"))?;
                viewer.handle_input(&input);
            }
            Step::Menu { marker, entry_id } => {
                if !viewer.select_menu_entry(marker, *entry_id) {
                    warn!(step = index, %marker, entry_id, "menu entry not selectable");
                }
            }
            Step::Resize { width, height } => viewer.resize(*width, *height),
            Step::Advance { ms } => {
                now += Duration::from_millis(*ms);
                viewer.frame(now, &mut sink);
            }
        }
        viewer.flush_feedback(&mut publisher);
    }

    for name in viewer.markers().names() {
        if let Some(handle) = viewer.markers().handle(name) {
            let pose = handle.pose();
            info!(
                marker = %name,
                frame = %handle.frame_id(),
                x = pose.position.x,
                y = pose.position.y,
                z = pose.position.z,
                "final pose"
            );
        }
    }
    info!(feedback = publisher.sent, frames = sink.frames, "replay complete");
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let update: InteractiveMarkerUpdate = read_json(&args.update)?;
    let kind = update
        .update_type()
        .context("update batch has an unknown type")?;
    println!(
        "server {:?} seq {} type {:?}",
        update.server_id, update.seq_num, kind
    );
    if kind == UpdateType::KeepAlive {
        if !update.is_empty() {
            bail!("keep-alive batch carries operations");
        }
        return Ok(());
    }

    for marker in &update.markers {
        let frame = if marker.is_frame_locked() {
            "frame-locked"
        } else {
            "stamped"
        };
        println!(
            "add {} in {} ({frame}), {} controls, {} menu entries",
            marker.name,
            marker.header.frame_id,
            marker.controls.len(),
            marker.menu_entries.len()
        );
        for control in &marker.controls {
            let mode = match control.interaction() {
                Ok(mode) => format!("{mode:?}"),
                Err(err) => format!("invalid ({err})"),
            };
            let orientation = match control.orientation_behavior() {
                Ok(mode) => format!("{mode:?}"),
                Err(err) => format!("invalid ({err})"),
            };
            println!(
                "  control {:?}: {mode}, orientation {orientation}, {} visuals",
                control.name,
                control.markers.len()
            );
        }
    }
    for pose in &update.poses {
        let p = pose.pose.position;
        println!("pose {} -> ({}, {}, {})", pose.name, p.x, p.y, p.z);
    }
    for name in &update.erases {
        println!("erase {name}");
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    from_json(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
