use super::*;
use inkroom_wire::types::Tool;

fn start(id: &str) -> ClientOp {
    ClientOp::StrokeStart {
        stroke_id: id.to_owned(),
        tool: Tool::Brush,
        color: "#123456".to_owned(),
        width: 3,
        x: 0.0,
        y: 0.0,
    }
}

fn end(id: &str) -> ClientOp {
    ClientOp::StrokeEnd { stroke_id: id.to_owned() }
}

fn points(id: &str, pts: &[[f64; 2]]) -> ClientOp {
    ClientOp::StrokePoints { stroke_id: id.to_owned(), points: pts.to_vec() }
}

/// Apply an op that must succeed with a broadcast, asserting invariants.
fn apply(state: &mut DrawingState, user: &str, op: ClientOp) -> ServerOp {
    let out = state
        .apply_client_op(user, op)
        .expect("op should succeed")
        .expect("op should broadcast");
    assert!(state.invariants_hold(), "invariants violated after op");
    out
}

/// Commit a stroke for `user` in one start+end pair.
fn commit(state: &mut DrawingState, user: &str, id: &str) {
    apply(state, user, start(id));
    apply(state, user, end(id));
}

// =============================================================================
// STROKE LIFECYCLE
// =============================================================================

#[test]
fn stroke_start_registers_uncommitted_stroke_with_initial_point() {
    let mut state = DrawingState::new();
    let op = apply(&mut state, "alice", start("s1"));

    assert!(matches!(op, ServerOp::StrokeStart { .. }));
    let stroke = state.stroke("s1").expect("stroke should exist");
    assert!(!stroke.committed);
    assert_eq!(stroke.user_id, "alice");
    assert_eq!(stroke.points, vec![[0.0, 0.0]]);
    assert!(state.committed_order().is_empty());
}

#[test]
fn duplicate_stroke_start_fails_and_leaves_original_untouched() {
    let mut state = DrawingState::new();
    apply(&mut state, "alice", start("s1"));
    apply(&mut state, "alice", points("s1", &[[1.0, 1.0]]));

    let err = state
        .apply_client_op("bob", start("s1"))
        .expect_err("duplicate id should fail");
    assert!(matches!(err, DrawError::DuplicateStroke(_)));

    let stroke = state.stroke("s1").expect("stroke should exist");
    assert_eq!(stroke.user_id, "alice");
    assert_eq!(stroke.points, vec![[0.0, 0.0], [1.0, 1.0]]);
    assert!(state.invariants_hold());
}

#[test]
fn stroke_points_appends_in_order() {
    let mut state = DrawingState::new();
    apply(&mut state, "alice", start("s1"));
    apply(&mut state, "alice", points("s1", &[[1.0, 2.0], [3.0, 4.0]]));
    apply(&mut state, "alice", points("s1", &[[5.0, 6.0]]));

    let stroke = state.stroke("s1").expect("stroke should exist");
    assert_eq!(stroke.points, vec![[0.0, 0.0], [1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
}

#[test]
fn stroke_points_rejects_unknown_stroke() {
    let mut state = DrawingState::new();
    let err = state
        .apply_client_op("alice", points("ghost", &[[1.0, 1.0]]))
        .expect_err("unknown stroke should fail");
    assert!(matches!(err, DrawError::UnknownStroke(_)));
}

#[test]
fn stroke_points_rejects_other_users_stroke() {
    let mut state = DrawingState::new();
    apply(&mut state, "alice", start("s1"));

    let err = state
        .apply_client_op("bob", points("s1", &[[1.0, 1.0]]))
        .expect_err("non-owner should fail");
    assert!(matches!(err, DrawError::NotOwner(_)));

    // Stroke still has exactly its initial point.
    assert_eq!(state.stroke("s1").expect("stroke").points, vec![[0.0, 0.0]]);
}

#[test]
fn stroke_points_rejects_committed_stroke() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");

    let err = state
        .apply_client_op("alice", points("s1", &[[1.0, 1.0]]))
        .expect_err("committed stroke should be frozen");
    assert!(matches!(err, DrawError::AlreadyCommitted(_)));
}

#[test]
fn stroke_end_commits_and_appends_to_order() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    commit(&mut state, "bob", "s2");

    assert_eq!(state.committed_order(), ["s1".to_owned(), "s2".to_owned()]);
    assert!(state.stroke("s1").expect("stroke").committed);
    assert!(state.stroke("s2").expect("stroke").committed);
}

#[test]
fn stroke_end_enforces_ownership_and_lifecycle() {
    let mut state = DrawingState::new();
    apply(&mut state, "alice", start("s1"));

    let err = state
        .apply_client_op("bob", end("s1"))
        .expect_err("non-owner end should fail");
    assert!(matches!(err, DrawError::NotOwner(_)));

    apply(&mut state, "alice", end("s1"));
    let err = state
        .apply_client_op("alice", end("s1"))
        .expect_err("double end should fail");
    assert!(matches!(err, DrawError::AlreadyCommitted(_)));
}

// =============================================================================
// UNDO / REDO
// =============================================================================

#[test]
fn undo_targets_latest_committed_stroke_regardless_of_author() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "A1");
    commit(&mut state, "bob", "B1");

    // Bob asks; Bob's stroke is latest.
    let op = apply(&mut state, "bob", ClientOp::Undo);
    assert_eq!(op, ServerOp::Undo { stroke_id: "B1".into() });

    // Alice asks; now Alice's stroke is the latest active one.
    let op = apply(&mut state, "alice", ClientOp::Undo);
    assert_eq!(op, ServerOp::Undo { stroke_id: "A1".into() });

    // Redo re-activates in last-undone-first order.
    let op = apply(&mut state, "alice", ClientOp::Redo);
    assert_eq!(op, ServerOp::Redo { stroke_id: "A1".into() });
    assert_eq!(state.active_committed(), vec!["A1"]);
}

#[test]
fn undo_with_nothing_committed_is_suppressed() {
    let mut state = DrawingState::new();
    let out = state
        .apply_client_op("alice", ClientOp::Undo)
        .expect("undo should not error");
    assert!(out.is_none());

    // Still suppressed with only an in-progress stroke present.
    apply(&mut state, "alice", start("s1"));
    let out = state
        .apply_client_op("alice", ClientOp::Undo)
        .expect("undo should not error");
    assert!(out.is_none());
}

#[test]
fn redo_with_empty_stack_is_suppressed() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    let out = state
        .apply_client_op("alice", ClientOp::Redo)
        .expect("redo should not error");
    assert!(out.is_none());
}

#[test]
fn undo_then_redo_restores_the_active_scene() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    commit(&mut state, "alice", "s2");
    let before: Vec<String> = state.active_committed().into_iter().map(String::from).collect();

    apply(&mut state, "alice", ClientOp::Undo);
    apply(&mut state, "alice", ClientOp::Redo);

    let after: Vec<String> = state.active_committed().into_iter().map(String::from).collect();
    assert_eq!(after, before);
}

#[test]
fn n_undos_then_n_redos_restore_the_original_set() {
    let mut state = DrawingState::new();
    for id in ["s1", "s2", "s3", "s4"] {
        commit(&mut state, "alice", id);
    }
    let before: Vec<String> = state.active_committed().into_iter().map(String::from).collect();

    for _ in 0..3 {
        apply(&mut state, "alice", ClientOp::Undo);
    }
    assert_eq!(state.active_committed(), vec!["s1"]);

    for _ in 0..3 {
        apply(&mut state, "alice", ClientOp::Redo);
    }
    let after: Vec<String> = state.active_committed().into_iter().map(String::from).collect();
    assert_eq!(after, before);
}

#[test]
fn committing_a_new_stroke_invalidates_redo() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "A1");
    apply(&mut state, "alice", ClientOp::Undo);

    commit(&mut state, "alice", "A2");

    let out = state
        .apply_client_op("alice", ClientOp::Redo)
        .expect("redo should not error");
    assert!(out.is_none(), "redo should be invalidated by the commit");
    assert_eq!(state.active_committed(), vec!["A2"]);
}

#[test]
fn starting_or_extending_a_stroke_does_not_invalidate_redo() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "A1");
    apply(&mut state, "alice", ClientOp::Undo);

    apply(&mut state, "alice", start("A2"));
    apply(&mut state, "alice", points("A2", &[[1.0, 1.0]]));

    let op = apply(&mut state, "alice", ClientOp::Redo);
    assert_eq!(op, ServerOp::Redo { stroke_id: "A1".into() });
}

#[test]
fn recommitting_an_undone_stroke_id_leaves_it_active() {
    // stroke_end removes the id from `undone` defensively; the closest
    // reachable shape is undo → redo churn around a commit.
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    apply(&mut state, "alice", ClientOp::Undo);
    apply(&mut state, "alice", ClientOp::Redo);
    commit(&mut state, "alice", "s2");

    assert_eq!(state.active_committed(), vec!["s1", "s2"]);
    assert!(state.invariants_hold());
}

// =============================================================================
// VIEWS
// =============================================================================

#[test]
fn scene_separates_committed_and_in_progress() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    apply(&mut state, "bob", start("s2"));
    apply(&mut state, "alice", ClientOp::Undo);

    let scene = state.scene();
    assert_eq!(scene.committed.len(), 1);
    assert_eq!(scene.committed[0].id, "s1");
    assert_eq!(scene.in_progress.len(), 1);
    assert_eq!(scene.in_progress[0].id, "s2");
    assert_eq!(scene.undone, vec!["s1".to_owned()]);
}

#[test]
fn snapshot_omits_in_progress_strokes() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    apply(&mut state, "bob", start("s2"));

    let snapshot = state.snapshot(5);
    assert_eq!(snapshot.seq, 5);
    assert_eq!(snapshot.strokes.len(), 1);
    assert_eq!(snapshot.strokes[0].id, "s1");
    assert_eq!(snapshot.committed_order, vec!["s1".to_owned()]);
}

#[test]
fn snapshot_emits_strokes_in_committed_order() {
    let mut state = DrawingState::new();
    for id in ["z", "a", "m"] {
        commit(&mut state, "alice", id);
    }

    let snapshot = state.snapshot(3);
    let ids: Vec<_> = snapshot.strokes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["z", "a", "m"]);
}

#[test]
fn restore_round_trips_committed_state() {
    let mut state = DrawingState::new();
    for id in ["x", "y", "z"] {
        commit(&mut state, "alice", id);
    }
    apply(&mut state, "alice", ClientOp::Undo); // undoes z
    // Leave an in-progress stroke behind; it must not survive.
    apply(&mut state, "bob", start("w"));

    let snapshot = state.snapshot(12);
    let mut restored = DrawingState::restore(&snapshot);

    assert!(restored.invariants_hold());
    assert_eq!(restored.committed_order(), state.committed_order());
    assert_eq!(restored.active_committed(), vec!["x", "y"]);
    assert!(restored.stroke("w").is_none());

    // Redo continues to work across the restore boundary.
    let op = restored
        .apply_client_op("anyone", ClientOp::Redo)
        .expect("redo should succeed")
        .expect("redo should broadcast");
    assert_eq!(op, ServerOp::Redo { stroke_id: "z".into() });
}

#[test]
fn restore_of_empty_snapshot_yields_empty_state() {
    let snapshot = RoomSnapshot {
        seq: 0,
        strokes: vec![],
        undone: vec![],
        committed_order: vec![],
        redo_stack: vec![],
    };
    let state = DrawingState::restore(&snapshot);
    assert!(state.invariants_hold());
    assert!(state.committed_order().is_empty());
}

#[test]
fn committed_order_is_prefix_stable_across_ops() {
    let mut state = DrawingState::new();
    commit(&mut state, "alice", "s1");
    commit(&mut state, "bob", "s2");
    let earlier = state.committed_order().to_vec();

    apply(&mut state, "alice", ClientOp::Undo);
    apply(&mut state, "alice", ClientOp::Undo);
    commit(&mut state, "alice", "s3");
    apply(&mut state, "bob", ClientOp::Undo);

    let later = state.committed_order().to_vec();
    assert!(later.starts_with(&earlier), "committed order must be prefix-stable");
}
