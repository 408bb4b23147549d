use std::time::Duration;

use anyhow::{Context, Result};
use imark_geometry::{InnerSpace, Vec3, ZERO};
use imark_protocol::{
    FeedbackType, Header, InteractionMode, InteractiveMarker, InteractiveMarkerControl,
    InteractiveMarkerFeedback, InteractiveMarkerUpdate, MenuEntry, Point, VisualMarker,
    marker_type,
};
use imark_view::{HeadlessSink, MouseButton, Point2, PointerInput, Target, Viewer, ViewerConfig};

fn cube_control(name: &str, mode: InteractionMode) -> InteractiveMarkerControl {
    InteractiveMarkerControl {
        name: name.to_string(),
        interaction_mode: mode.into(),
        markers: vec![VisualMarker {
            kind: marker_type::CUBE,
            scale: Point {
                x: 0.4,
                y: 0.4,
                z: 0.4,
            },
            ..VisualMarker::default()
        }],
        ..InteractiveMarkerControl::default()
    }
}

fn add(viewer: &mut Viewer, control: InteractiveMarkerControl, menu: Vec<MenuEntry>) {
    let marker = InteractiveMarker {
        name: "box".to_string(),
        header: Header {
            frame_id: "base_link".to_string(),
            ..Header::default()
        },
        controls: vec![control],
        menu_entries: menu,
        ..InteractiveMarker::default()
    };
    viewer.process_update(&InteractiveMarkerUpdate {
        markers: vec![marker],
        ..InteractiveMarkerUpdate::default()
    });
}

fn setup(control: InteractiveMarkerControl) -> Result<(Viewer, HeadlessSink)> {
    let mut viewer = Viewer::new(&ViewerConfig::default())?;
    viewer.subscribe("/basic_controls");
    add(&mut viewer, control, Vec::new());
    let mut sink = HeadlessSink::default();
    viewer.frame(Duration::ZERO, &mut sink);
    Ok((viewer, sink))
}

fn pixel(viewer: &Viewer, point: Vec3) -> Result<Point2> {
    viewer
        .screen_point(point)
        .context("point is outside the view")
}

fn hit_point(viewer: &Viewer, at: Point2) -> Result<Vec3> {
    let ray = viewer
        .camera()
        .ray_through(viewer.router().viewport().to_ndc(at))
        .context("camera ray")?;
    let hits = viewer.scene().raycast(&ray, viewer.selectable());
    Ok(hits.first().context("pointer misses the marker")?.point)
}

fn feedback(viewer: &mut Viewer) -> Vec<InteractiveMarkerFeedback> {
    let mut sent = Vec::new();
    viewer.flush_feedback(&mut sent);
    sent
}

fn kinds(sent: &[InteractiveMarkerFeedback]) -> Vec<FeedbackType> {
    sent.iter().map(|feedback| feedback.event_type).collect()
}

#[test]
fn axis_drag_moves_marker_and_reports_feedback() -> Result<()> {
    let (mut viewer, mut sink) = setup(cube_control("move_x", InteractionMode::MoveAxis))?;
    let camera_before = viewer.camera().position;

    assert!(!viewer.is_dirty());

    let at = pixel(&viewer, ZERO)?;
    viewer.handle_input(&PointerInput::mouse_move(at));
    assert!(viewer.is_dirty());
    assert!(matches!(viewer.router().last_target(), Some(Target::Node(_))));

    viewer.handle_input(&PointerInput::mouse_down(at, MouseButton::Primary));
    let grabbed = hit_point(&viewer, at)?;
    let target = pixel(&viewer, grabbed + Vec3::new(1.0, 0.0, 0.0))?;
    viewer.handle_input(&PointerInput::mouse_move(target));
    viewer.handle_input(&PointerInput::mouse_up(target, MouseButton::Primary));
    viewer.frame(Duration::from_millis(16), &mut sink);

    let marker = viewer.markers().marker("box").context("marker")?;
    let position = marker.pose(viewer.scene()).position;
    assert!((position - Vec3::new(1.0, 0.0, 0.0)).magnitude() < 1.0e-3);
    assert!((viewer.camera().position - camera_before).magnitude() < 1.0e-9);

    let sent = feedback(&mut viewer);
    assert_eq!(
        kinds(&sent),
        vec![
            FeedbackType::MouseDown,
            FeedbackType::PoseUpdate,
            FeedbackType::MouseUp
        ]
    );
    assert_eq!(sent[0].marker_name, "box");
    assert_eq!(sent[0].control_name, "move_x");
    assert!(sent[0].mouse_point_valid);
    assert!((sent[1].pose.position.x - 1.0).abs() < 1.0e-3);
    assert_eq!(sink.frames, 2);
    Ok(())
}

#[test]
fn held_drag_repeats_the_latest_pose() -> Result<()> {
    let (mut viewer, mut sink) = setup(cube_control("move_x", InteractionMode::MoveAxis))?;
    let at = pixel(&viewer, ZERO)?;
    viewer.handle_input(&PointerInput::mouse_down(at, MouseButton::Primary));
    let grabbed = hit_point(&viewer, at)?;
    for step in [0.2, 0.4, 0.6] {
        let to = pixel(&viewer, grabbed + Vec3::new(step, 0.0, 0.0))?;
        viewer.handle_input(&PointerInput::mouse_move(to));
    }
    assert_eq!(feedback(&mut viewer).len(), 4);

    viewer.frame(Duration::from_millis(300), &mut sink);
    let resent = feedback(&mut viewer);
    assert_eq!(kinds(&resent), vec![FeedbackType::PoseUpdate]);
    assert!((resent[0].pose.position.x - 0.6).abs() < 1.0e-3);

    let to = pixel(&viewer, grabbed + Vec3::new(0.6, 0.0, 0.0))?;
    viewer.handle_input(&PointerInput::mouse_up(to, MouseButton::Primary));
    viewer.frame(Duration::from_secs(2), &mut sink);
    assert_eq!(kinds(&feedback(&mut viewer)), vec![FeedbackType::MouseUp]);
    Ok(())
}

#[test]
fn wheel_over_empty_space_zooms_the_camera() -> Result<()> {
    let (mut viewer, mut sink) = setup(cube_control("move_x", InteractionMode::MoveAxis))?;
    let radius = viewer.orbit().radius(viewer.camera());
    viewer.handle_input(&PointerInput::wheel(Point2::new(5.0, 5.0), 1.0));
    assert_eq!(viewer.router().last_target(), Some(Target::Fallback));
    viewer.frame(Duration::from_millis(16), &mut sink);
    let zoomed = viewer.orbit().radius(viewer.camera());
    assert!((zoomed - radius * 0.95).abs() < 1.0e-9);
    assert!(feedback(&mut viewer).is_empty());
    Ok(())
}

#[test]
fn button_click_is_reported() -> Result<()> {
    let (mut viewer, _sink) = setup(cube_control("press", InteractionMode::Button))?;
    let at = pixel(&viewer, ZERO)?;
    viewer.handle_input(&PointerInput::mouse_down(at, MouseButton::Primary));
    viewer.handle_input(&PointerInput::mouse_up(at, MouseButton::Primary));
    viewer.handle_input(&PointerInput::click(at, MouseButton::Primary));

    let sent = feedback(&mut viewer);
    assert_eq!(
        kinds(&sent),
        vec![
            FeedbackType::MouseDown,
            FeedbackType::MouseUp,
            FeedbackType::ButtonClick
        ]
    );
    assert!(sent[2].mouse_point_valid);
    Ok(())
}

#[test]
fn context_menu_selection_is_reported() -> Result<()> {
    let mut viewer = Viewer::new(&ViewerConfig::default())?;
    viewer.subscribe("/menu");
    let entries = vec![
        MenuEntry {
            id: 1,
            title: "Options".to_string(),
            ..MenuEntry::default()
        },
        MenuEntry {
            id: 2,
            parent_id: 1,
            title: "Reset".to_string(),
            ..MenuEntry::default()
        },
    ];
    add(&mut viewer, cube_control("menu", InteractionMode::Menu), entries);
    viewer.frame(Duration::ZERO, &mut HeadlessSink::default());

    assert!(!viewer.select_menu_entry("box", 2));
    viewer.handle_input(&PointerInput::context_menu(pixel(&viewer, ZERO)?));
    assert!(!viewer.select_menu_entry("box", 1));
    assert!(viewer.select_menu_entry("box", 2));

    let sent = feedback(&mut viewer);
    assert_eq!(kinds(&sent), vec![FeedbackType::MenuSelect]);
    assert_eq!(sent[0].menu_entry_id, 2);
    assert_eq!(sent[0].control_name, "menu");
    Ok(())
}

#[test]
fn feedback_needs_a_subscription() -> Result<()> {
    let (mut viewer, _sink) = setup(cube_control("press", InteractionMode::Button))?;
    let at = pixel(&viewer, ZERO)?;
    viewer.handle_input(&PointerInput::mouse_down(at, MouseButton::Primary));
    viewer.unsubscribe();
    assert!(viewer.markers().is_empty());
    let mut sent = Vec::new();
    assert_eq!(viewer.flush_feedback(&mut sent), 0);
    assert!(sent.is_empty());
    Ok(())
}
