//! Unit tests for web-auth discovery and dedup

use ovpman_core::error::BusError;
use ovpman_core::types::ConnectionState;
use ovpman_core::vpn::auth::{
    probe_auth_url, url_in_message, AuthTracker, InputRequest, UserInputQueue,
};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueueCall {
    PendingTypes,
    PendingIds(u32, u32),
    FetchRequest(u32, u32, u32),
}

/// Scripted input queue recording the calls made against it
#[derive(Default)]
struct MockQueue {
    calls: Mutex<Vec<QueueCall>>,
    types: Vec<(u32, u32)>,
    ids: Vec<u32>,
    description: String,
}

impl MockQueue {
    fn calls(&self) -> Vec<QueueCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl UserInputQueue for MockQueue {
    async fn pending_types(&self) -> Result<Vec<(u32, u32)>, BusError> {
        self.calls.lock().unwrap().push(QueueCall::PendingTypes);
        Ok(self.types.clone())
    }

    async fn pending_ids(&self, kind: u32, group: u32) -> Result<Vec<u32>, BusError> {
        self.calls
            .lock()
            .unwrap()
            .push(QueueCall::PendingIds(kind, group));
        Ok(self.ids.clone())
    }

    async fn fetch_request(
        &self,
        kind: u32,
        group: u32,
        id: u32,
    ) -> Result<InputRequest, BusError> {
        self.calls
            .lock()
            .unwrap()
            .push(QueueCall::FetchRequest(kind, group, id));
        Ok(InputRequest {
            kind,
            group,
            id,
            name: "web-auth".to_string(),
            description: self.description.clone(),
            hidden_input: String::new(),
            masked_input: false,
        })
    }
}

#[tokio::test]
async fn empty_queue_stops_after_the_first_call() {
    let queue = MockQueue::default();

    let url = probe_auth_url(&queue).await.unwrap();
    assert!(url.is_none());
    assert_eq!(queue.calls(), vec![QueueCall::PendingTypes]);
}

#[tokio::test]
async fn non_web_entries_do_not_trigger_further_calls() {
    let queue = MockQueue {
        types: vec![(2, 0), (3, 1)],
        ..MockQueue::default()
    };

    let url = probe_auth_url(&queue).await.unwrap();
    assert!(url.is_none());
    assert_eq!(queue.calls(), vec![QueueCall::PendingTypes]);
}

#[tokio::test]
async fn empty_id_list_stops_before_the_fetch() {
    let queue = MockQueue {
        types: vec![(1, 7)],
        ..MockQueue::default()
    };

    let url = probe_auth_url(&queue).await.unwrap();
    assert!(url.is_none());
    assert_eq!(
        queue.calls(),
        vec![QueueCall::PendingTypes, QueueCall::PendingIds(1, 7)]
    );
}

#[tokio::test]
async fn non_url_description_means_nothing_pending() {
    let queue = MockQueue {
        types: vec![(1, 7)],
        ids: vec![4],
        description: "enter your token".to_string(),
        ..MockQueue::default()
    };

    let url = probe_auth_url(&queue).await.unwrap();
    assert!(url.is_none());
}

#[tokio::test]
async fn url_description_is_returned_with_full_call_sequence() {
    let queue = MockQueue {
        types: vec![(2, 0), (1, 7)],
        ids: vec![4, 9],
        description: "https://auth.example.com/start?sid=abc".to_string(),
        ..MockQueue::default()
    };

    let url = probe_auth_url(&queue).await.unwrap();
    assert_eq!(
        url.as_deref(),
        Some("https://auth.example.com/start?sid=abc")
    );
    // First web-auth pair, first id
    assert_eq!(
        queue.calls(),
        vec![
            QueueCall::PendingTypes,
            QueueCall::PendingIds(1, 7),
            QueueCall::FetchRequest(1, 7, 4),
        ]
    );
}

#[test]
fn url_in_message_extracts_the_token() {
    assert_eq!(
        url_in_message("please visit https://auth.example.com/x then retry"),
        Some("https://auth.example.com/x")
    );
    assert_eq!(
        url_in_message("http://auth.example.com/y"),
        Some("http://auth.example.com/y")
    );
    assert!(url_in_message("no links here").is_none());
}

#[test]
fn tracker_surfaces_once_per_auth_round() {
    let mut tracker = AuthTracker::new();

    assert!(!tracker.is_surfaced("/sessions/1"));
    tracker.mark_surfaced("/sessions/1");
    assert!(tracker.is_surfaced("/sessions/1"));

    // Still in AuthRequired: stays deduplicated
    tracker.note_state("/sessions/1", ConnectionState::AuthRequired);
    assert!(tracker.is_surfaced("/sessions/1"));

    // Leaving AuthRequired re-arms the session
    tracker.note_state("/sessions/1", ConnectionState::Connected);
    assert!(!tracker.is_surfaced("/sessions/1"));
}

#[test]
fn tracker_forgets_dead_sessions() {
    let mut tracker = AuthTracker::new();
    tracker.mark_surfaced("/sessions/1");
    tracker.mark_surfaced("/sessions/2");

    tracker.retain_sessions(|path| path == "/sessions/2");

    assert!(!tracker.is_surfaced("/sessions/1"));
    assert!(tracker.is_surfaced("/sessions/2"));
}
