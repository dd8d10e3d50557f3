use super::*;
use crate::assets::store::AssetId;

fn canvas() -> Rect {
    Rect::new(0.0, 0.0, 1000.0, 500.0)
}

fn engine_with_layer() -> (LayerEngine, LayerId) {
    let mut engine = LayerEngine::new();
    let id = engine.add(AssetId::from("logo"));
    (engine, id)
}

#[test]
fn drag_ten_percent_right_commits_once() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    let before = engine.history_len();

    assert!(g.pointer_down(&mut engine, &id, Point::new(100.0, 100.0), canvas()));
    assert!(g.pointer_move(&mut engine, Point::new(150.0, 100.0)));
    assert!(g.pointer_move(&mut engine, Point::new(200.0, 100.0)));
    assert_eq!(engine.history_len(), before);
    assert!(g.pointer_up(&mut engine));

    let layer = engine.layer(&id).unwrap();
    assert!((layer.x - 60.0).abs() < 1e-9);
    assert!((layer.y - 50.0).abs() < 1e-9);
    assert_eq!(engine.history_len(), before + 1);
    assert!(g.session().is_none());
}

#[test]
fn drag_clamps_to_canvas() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    g.pointer_down(&mut engine, &id, Point::new(500.0, 250.0), canvas());
    g.pointer_move(&mut engine, Point::new(5000.0, -5000.0));
    let layer = engine.layer(&id).unwrap();
    assert_eq!((layer.x, layer.y), (100.0, 0.0));
}

#[test]
fn click_without_movement_does_not_commit() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    let before = engine.history_len();
    g.pointer_down(&mut engine, &id, Point::new(10.0, 10.0), canvas());
    g.pointer_move(&mut engine, Point::new(10.0, 10.0));
    assert!(!g.pointer_up(&mut engine));
    assert_eq!(engine.history_len(), before);
}

#[test]
fn handlers_without_session_are_noops() {
    let (mut engine, _) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    assert!(!g.pointer_move(&mut engine, Point::new(1.0, 1.0)));
    assert!(!g.touch_move(&mut engine, &[Point::ZERO, Point::new(1.0, 1.0)]));
    assert!(!g.pointer_up(&mut engine));
    assert!(!g.pointer_down(&mut engine, &LayerId::from("ghost"), Point::ZERO, canvas()));
}

#[test]
fn pinch_scales_and_rotates() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    let start = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
    assert!(g.touch_start(&mut engine, &id, &start, canvas()));

    // twice as far apart, rotated a quarter turn clockwise in screen space
    assert!(g.touch_move(&mut engine, &[Point::new(0.0, 0.0), Point::new(0.0, 200.0)]));
    let layer = engine.layer(&id).unwrap();
    assert!((layer.scale - 2.0).abs() < 1e-9);
    assert!((layer.rotation - 90.0).abs() < 1e-9);

    g.touch_move(&mut engine, &[Point::new(0.0, 0.0), Point::new(10_000.0, 0.0)]);
    assert_eq!(engine.layer(&id).unwrap().scale, 5.0);
    assert!(g.pointer_up(&mut engine));
}

#[test]
fn second_finger_turns_drag_into_pinch() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    g.touch_start(&mut engine, &id, &[Point::new(0.0, 0.0)], canvas());
    assert!(!g.touch_move(&mut engine, &[Point::new(0.0, 0.0), Point::new(50.0, 0.0)]));
    assert!(matches!(g.session().unwrap().kind, GestureKind::Pinch { .. }));
    assert!(g.touch_move(&mut engine, &[Point::new(0.0, 0.0), Point::new(25.0, 0.0)]));
    assert!((engine.layer(&id).unwrap().scale - 0.5).abs() < 1e-9);
}

#[test]
fn wheel_commits_after_quiet_period() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    let before = engine.history_len();

    assert!(g.wheel(&mut engine, -120.0, 0));
    assert!(g.wheel(&mut engine, -3.0, 100));
    assert!(g.wheel(&mut engine, -999.0, 200));
    assert!((engine.layer(&id).unwrap().scale - 1.3).abs() < 1e-9);

    assert!(!g.poll(&mut engine, 600));
    assert_eq!(engine.history_len(), before);
    assert!(g.poll(&mut engine, 700));
    assert_eq!(engine.history_len(), before + 1);
    assert!(!g.poll(&mut engine, 5000));
}

#[test]
fn wheel_clamps_scale() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    for i in 0..20 {
        g.wheel(&mut engine, 1.0, i);
    }
    assert_eq!(engine.layer(&id).unwrap().scale, 0.1);
    assert!(!g.wheel(&mut engine, 1.0, 100));
}

#[test]
fn pointer_down_flushes_pending_wheel() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    let before = engine.history_len();
    g.wheel(&mut engine, -1.0, 0);
    g.pointer_down(&mut engine, &id, Point::ZERO, canvas());
    assert_eq!(engine.history_len(), before + 1);
    assert!(!g.wheel_pending());
}

#[test]
fn switching_layers_commits_prior_dirty_session() {
    let mut engine = LayerEngine::new();
    let a = engine.add(AssetId::from("a"));
    let b = engine.add(AssetId::from("b"));
    let mut g = GestureInterpreter::new();
    let before = engine.history_len();

    g.pointer_down(&mut engine, &a, Point::ZERO, canvas());
    g.pointer_move(&mut engine, Point::new(100.0, 0.0));
    g.pointer_down(&mut engine, &b, Point::ZERO, canvas());
    assert_eq!(engine.history_len(), before + 1);
    assert_eq!(engine.selected(), Some(&b));
}

#[test]
fn processing_suppresses_and_cancels() {
    let (mut engine, id) = engine_with_layer();
    let mut g = GestureInterpreter::new();
    let before = engine.history_len();

    g.pointer_down(&mut engine, &id, Point::ZERO, canvas());
    g.pointer_move(&mut engine, Point::new(100.0, 0.0));
    g.wheel(&mut engine, -1.0, 0);
    g.set_processing(true);

    assert!(g.session().is_none());
    assert!(!g.pointer_up(&mut engine));
    assert!(!g.poll(&mut engine, 10_000));
    assert!(!g.pointer_down(&mut engine, &id, Point::ZERO, canvas()));
    assert!(!g.wheel(&mut engine, -1.0, 0));
    assert_eq!(engine.history_len(), before);

    g.set_processing(false);
    assert!(g.pointer_down(&mut engine, &id, Point::ZERO, canvas()));
}
