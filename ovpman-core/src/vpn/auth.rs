//! Web-authentication discovery
//!
//! A session that needs interactive (OAuth-style) authentication parks a
//! request in its user-input queue. Discovery is a three-step query: list
//! pending `(type, group)` pairs, list request ids for the web-auth pair,
//! fetch the request record. Only a record whose description is an HTTP(S)
//! URL counts; anything else means no authentication is pending.
//!
//! [`AuthTracker`] keeps the per-session dedup state so a URL is surfaced
//! once per authentication round, not on every poll.

use crate::error::BusError;
use crate::types::ConnectionState;
use std::collections::HashSet;

/// Input-request type denoting web authentication
pub const INPUT_TYPE_WEB_AUTH: u32 = 1;

/// One record from a session's user-input queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest {
    pub kind: u32,
    pub group: u32,
    pub id: u32,
    pub name: String,
    pub description: String,
    pub hidden_input: String,
    pub masked_input: bool,
}

/// The three queue queries a session exposes.
///
/// Split out as a trait so the probe sequencing can be exercised against a
/// scripted queue.
#[allow(async_fn_in_trait)]
pub trait UserInputQueue {
    /// Pending `(type, group)` pairs.
    async fn pending_types(&self) -> Result<Vec<(u32, u32)>, BusError>;

    /// Request ids pending for one `(type, group)` pair.
    async fn pending_ids(&self, kind: u32, group: u32) -> Result<Vec<u32>, BusError>;

    /// Fetch one request record.
    async fn fetch_request(&self, kind: u32, group: u32, id: u32)
        -> Result<InputRequest, BusError>;
}

/// Probe a session's input queue for a pending web-auth URL.
///
/// Returns `Ok(None)` when the queue holds no web-auth entry, no request id,
/// or a description that is not an HTTP(S) URL; later steps are skipped as
/// soon as an earlier one comes up empty.
pub async fn probe_auth_url<Q: UserInputQueue>(queue: &Q) -> Result<Option<String>, BusError> {
    let pending = queue.pending_types().await?;
    let Some((kind, group)) = pending
        .into_iter()
        .find(|(kind, _)| *kind == INPUT_TYPE_WEB_AUTH)
    else {
        return Ok(None);
    };

    let ids = queue.pending_ids(kind, group).await?;
    let Some(id) = ids.first().copied() else {
        return Ok(None);
    };

    let request = queue.fetch_request(kind, group, id).await?;
    if is_http_url(&request.description) {
        Ok(Some(request.description))
    } else {
        Ok(None)
    }
}

/// Extract an HTTP(S) URL embedded in a status message.
///
/// Some backend versions never queue the request and only mention the URL
/// in the free-text status; this is the fallback for that case.
pub fn url_in_message(message: &str) -> Option<&str> {
    let start = message
        .find("https://")
        .or_else(|| message.find("http://"))?;
    let rest = &message[start..];
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn is_http_url(text: &str) -> bool {
    text.starts_with("https://") || text.starts_with("http://")
}

/// Tracks which sessions already had their auth URL surfaced.
///
/// A session is marked when its URL is handed out and unmarked when its
/// state moves away from `AuthRequired` or the session disappears, so the
/// next authentication round surfaces again.
#[derive(Debug, Default)]
pub struct AuthTracker {
    surfaced: HashSet<String>,
}

impl AuthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this session's URL was already handed out this round.
    pub fn is_surfaced(&self, session_path: &str) -> bool {
        self.surfaced.contains(session_path)
    }

    /// Record that the URL was handed out; only a successful surface marks
    /// the session, so a failed probe is retried on the next poll.
    pub fn mark_surfaced(&mut self, session_path: &str) {
        self.surfaced.insert(session_path.to_string());
    }

    /// Record the session's current state, clearing the mark once the
    /// session leaves `AuthRequired`.
    pub fn note_state(&mut self, session_path: &str, state: ConnectionState) {
        if state != ConnectionState::AuthRequired {
            self.surfaced.remove(session_path);
        }
    }

    /// Drop marks for sessions that no longer exist.
    pub fn retain_sessions<F>(&mut self, is_live: F)
    where
        F: Fn(&str) -> bool,
    {
        self.surfaced.retain(|path| is_live(path));
    }
}
