//! Unit tests for connection reconciliation

mod common;

use common::{auth_pending_session, connected_session, profile};
use ovpman_core::types::ConnectionState;
use ovpman_core::vpn::ConnectionReconciler;

#[test]
fn every_profile_gets_exactly_one_record() {
    let mut reconciler = ConnectionReconciler::new();

    let configs = vec![profile("A", "/configs/a"), profile("B", "/configs/b")];
    let sessions = vec![connected_session("A", "/sessions/1")];

    let records = reconciler.reconcile(&configs, &sessions);

    assert_eq!(records.len(), 2);

    let a = &records[0];
    assert_eq!(a.name, "A");
    assert_eq!(a.session_path.as_deref(), Some("/sessions/1"));
    assert_eq!(a.state, ConnectionState::Connected);
    assert_eq!(a.device_name.as_deref(), Some("tun0"));

    let b = &records[1];
    assert_eq!(b.name, "B");
    assert!(b.session_path.is_none());
    assert_eq!(b.state, ConnectionState::Disconnected);
    assert!(b.connect_time.is_none());
}

#[test]
fn records_come_out_sorted_by_name() {
    let mut reconciler = ConnectionReconciler::new();

    let configs = vec![
        profile("zebra", "/configs/z"),
        profile("alpha", "/configs/a"),
        profile("mid", "/configs/m"),
    ];

    let records = reconciler.reconcile(&configs, &[]);
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zebra"]);
}

#[test]
fn classified_state_follows_the_session() {
    let mut reconciler = ConnectionReconciler::new();

    let configs = vec![profile("A", "/configs/a")];
    let sessions = vec![auth_pending_session("A", "/sessions/1")];

    let records = reconciler.reconcile(&configs, &sessions);
    assert_eq!(records[0].state, ConnectionState::AuthRequired);
}

#[test]
fn connect_time_is_cached_per_session_path() {
    let mut reconciler = ConnectionReconciler::new();
    let configs = vec![profile("A", "/configs/a")];

    let mut session = connected_session("A", "/sessions/1");
    session.session_created = 1_000;

    let records = reconciler.reconcile(&configs, &[session.clone()]);
    assert_eq!(records[0].connect_time, Some(1_000));

    // The backend may rewrite the timestamp; the first observation sticks
    session.session_created = 2_000;
    let records = reconciler.reconcile(&configs, &[session.clone()]);
    assert_eq!(records[0].connect_time, Some(1_000));

    // Session gone: the cache entry goes with it
    reconciler.reconcile(&configs, &[]);

    session.session_created = 2_000;
    let records = reconciler.reconcile(&configs, &[session]);
    assert_eq!(records[0].connect_time, Some(2_000));
}

#[test]
fn first_session_match_wins() {
    let mut reconciler = ConnectionReconciler::new();

    let configs = vec![profile("A", "/configs/a")];
    let sessions = vec![
        connected_session("A", "/sessions/1"),
        connected_session("A", "/sessions/2"),
    ];

    let records = reconciler.reconcile(&configs, &sessions);
    assert_eq!(records[0].session_path.as_deref(), Some("/sessions/1"));
}

#[test]
fn duplicate_profile_names_bind_the_same_session() {
    let mut reconciler = ConnectionReconciler::new();

    // Known quirk: name-based matching cannot tell the two apart
    let configs = vec![profile("A", "/configs/a1"), profile("A", "/configs/a2")];
    let sessions = vec![connected_session("A", "/sessions/1")];

    let records = reconciler.reconcile(&configs, &sessions);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].session_path.as_deref(), Some("/sessions/1"));
    assert_eq!(records[1].session_path.as_deref(), Some("/sessions/1"));
}

#[test]
fn unmatched_sessions_are_ignored() {
    let mut reconciler = ConnectionReconciler::new();

    let configs = vec![profile("A", "/configs/a")];
    let sessions = vec![connected_session("orphan", "/sessions/9")];

    let records = reconciler.reconcile(&configs, &sessions);
    assert_eq!(records.len(), 1);
    assert!(records[0].session_path.is_none());
    assert_eq!(records[0].state, ConnectionState::Disconnected);
}
