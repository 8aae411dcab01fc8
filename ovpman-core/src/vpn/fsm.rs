//! Per-connection state machine
//!
//! One FSM instance exists per reconciled connection. All mutation goes
//! through [`ConnectionFsm::process_event`]; transitions missing from the
//! table are rejected and absorbed so a single bad observation cannot derail
//! the polling loop. [`ConnectionFsm::force_state`] exists solely to resync
//! with an observed reality the table does not model, and always logs.

use crate::types::ConnectionState;
use tracing::{debug, info, warn};

/// Events driving the state machine.
///
/// `ConnectRequested`/`DisconnectRequested` come from the user; the
/// `Session*` events are observations reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmEvent {
    ConnectRequested,
    DisconnectRequested,
    SessionConnecting,
    SessionConnected,
    SessionPaused,
    SessionResumed,
    SessionAuthRequired,
    SessionError,
    SessionDisconnected,
    SessionReconnecting,
}

impl FsmEvent {
    /// The observation event corresponding to a classified state.
    pub fn observed(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => FsmEvent::SessionDisconnected,
            ConnectionState::Connecting => FsmEvent::SessionConnecting,
            ConnectionState::Connected => FsmEvent::SessionConnected,
            ConnectionState::Paused => FsmEvent::SessionPaused,
            ConnectionState::Reconnecting => FsmEvent::SessionReconnecting,
            ConnectionState::AuthRequired => FsmEvent::SessionAuthRequired,
            ConnectionState::Error => FsmEvent::SessionError,
        }
    }
}

impl std::fmt::Display for FsmEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FsmEvent::ConnectRequested => "CONNECT_REQUESTED",
            FsmEvent::DisconnectRequested => "DISCONNECT_REQUESTED",
            FsmEvent::SessionConnecting => "SESSION_CONNECTING",
            FsmEvent::SessionConnected => "SESSION_CONNECTED",
            FsmEvent::SessionPaused => "SESSION_PAUSED",
            FsmEvent::SessionResumed => "SESSION_RESUMED",
            FsmEvent::SessionAuthRequired => "SESSION_AUTH_REQUIRED",
            FsmEvent::SessionError => "SESSION_ERROR",
            FsmEvent::SessionDisconnected => "SESSION_DISCONNECTED",
            FsmEvent::SessionReconnecting => "SESSION_RECONNECTING",
        };
        f.write_str(name)
    }
}

/// Actions a consumer may offer for a connection in its current state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowedActions {
    pub connect: bool,
    pub disconnect: bool,
    pub pause: bool,
    pub resume: bool,
    pub authenticate: bool,
}

use crate::types::ConnectionState::{
    AuthRequired, Connected, Connecting, Disconnected, Error, Paused, Reconnecting,
};
use self::FsmEvent::{
    ConnectRequested, DisconnectRequested, SessionAuthRequired, SessionConnected,
    SessionConnecting, SessionDisconnected, SessionError, SessionPaused, SessionReconnecting,
    SessionResumed,
};

/// All valid transitions. Anything absent is rejected.
///
/// Each state accepts its own observation as a self-transition so repeated
/// polls do not register as anomalies. The extra rows out of `Disconnected`
/// cover attaching to sessions that already existed before this process
/// started.
const TRANSITIONS: &[(ConnectionState, FsmEvent, ConnectionState)] = &[
    // From DISCONNECTED
    (Disconnected, ConnectRequested, Connecting),
    (Disconnected, SessionConnecting, Connecting),
    (Disconnected, SessionDisconnected, Disconnected),
    (Disconnected, SessionConnected, Connected),
    (Disconnected, SessionAuthRequired, AuthRequired),
    (Disconnected, SessionPaused, Paused),
    (Disconnected, SessionError, Error),
    // From CONNECTING
    (Connecting, SessionConnected, Connected),
    (Connecting, SessionAuthRequired, AuthRequired),
    (Connecting, SessionError, Error),
    (Connecting, SessionDisconnected, Disconnected),
    (Connecting, DisconnectRequested, Disconnected),
    (Connecting, SessionConnecting, Connecting),
    // From CONNECTED
    (Connected, SessionPaused, Paused),
    (Connected, SessionReconnecting, Reconnecting),
    (Connected, SessionDisconnected, Disconnected),
    (Connected, DisconnectRequested, Disconnected),
    (Connected, SessionError, Error),
    (Connected, SessionConnected, Connected),
    // From PAUSED
    (Paused, SessionResumed, Connected),
    (Paused, SessionConnected, Connected),
    (Paused, SessionDisconnected, Disconnected),
    (Paused, DisconnectRequested, Disconnected),
    (Paused, SessionError, Error),
    (Paused, SessionPaused, Paused),
    // From AUTH_REQUIRED
    (AuthRequired, SessionConnected, Connected),
    (AuthRequired, SessionConnecting, Connecting),
    (AuthRequired, SessionDisconnected, Disconnected),
    (AuthRequired, DisconnectRequested, Disconnected),
    (AuthRequired, SessionError, Error),
    (AuthRequired, SessionAuthRequired, AuthRequired),
    // From ERROR
    (Error, SessionDisconnected, Disconnected),
    (Error, DisconnectRequested, Disconnected),
    (Error, ConnectRequested, Connecting),
    (Error, SessionConnecting, Connecting),
    (Error, SessionConnected, Connected),
    (Error, SessionError, Error),
    // From RECONNECTING
    (Reconnecting, SessionConnected, Connected),
    (Reconnecting, SessionAuthRequired, AuthRequired),
    (Reconnecting, SessionDisconnected, Disconnected),
    (Reconnecting, DisconnectRequested, Disconnected),
    (Reconnecting, SessionError, Error),
    (Reconnecting, SessionReconnecting, Reconnecting),
];

/// State machine for one connection
#[derive(Debug, Clone)]
pub struct ConnectionFsm {
    name: String,
    state: ConnectionState,
}

impl ConnectionFsm {
    /// New FSM for a connection, starting disconnected.
    pub fn new(name: &str) -> Self {
        debug!(connection = name, "FSM created in state disconnected");
        Self {
            name: name.to_string(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply an event. Returns the state after the transition; on a
    /// rejected event the state is unchanged.
    pub fn process_event(&mut self, event: FsmEvent) -> ConnectionState {
        let old = self.state;
        match TRANSITIONS
            .iter()
            .find(|(from, ev, _)| *from == old && *ev == event)
        {
            Some(&(_, _, to)) => {
                self.state = to;
                if old != to {
                    info!(connection = %self.name, "FSM: {old} + {event} -> {to}");
                } else {
                    debug!(connection = %self.name, "FSM: {old} + {event} -> {to} (no change)");
                }
            }
            None => {
                warn!(
                    connection = %self.name,
                    "FSM: transition from {old} with {event} rejected, staying in {old}"
                );
            }
        }
        self.state
    }

    /// Force the FSM into a state, bypassing the table.
    ///
    /// Only for resyncing with an observed backend state the table does not
    /// reach; every call is logged as a warning.
    pub fn force_state(&mut self, state: ConnectionState) {
        warn!(
            connection = %self.name,
            "FSM: force-syncing {old} -> {state} (observed state override)",
            old = self.state
        );
        self.state = state;
    }

    /// Actions valid in the current state.
    pub fn allowed_actions(&self) -> AllowedActions {
        actions_for(self.state)
    }
}

/// Actions valid in a given state.
pub fn actions_for(state: ConnectionState) -> AllowedActions {
    match state {
        Disconnected => AllowedActions {
            connect: true,
            ..AllowedActions::default()
        },
        Connecting | Reconnecting => AllowedActions {
            disconnect: true,
            ..AllowedActions::default()
        },
        Connected => AllowedActions {
            disconnect: true,
            pause: true,
            ..AllowedActions::default()
        },
        Paused => AllowedActions {
            resume: true,
            disconnect: true,
            ..AllowedActions::default()
        },
        AuthRequired => AllowedActions {
            authenticate: true,
            disconnect: true,
            ..AllowedActions::default()
        },
        // Connect doubles as retry
        Error => AllowedActions {
            connect: true,
            disconnect: true,
            ..AllowedActions::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_observed_transition_lands_in_the_observed_state() {
        for &(_, event, to) in TRANSITIONS {
            if let FsmEvent::SessionResumed = event {
                continue;
            }
            if matches!(
                event,
                FsmEvent::ConnectRequested | FsmEvent::DisconnectRequested
            ) {
                continue;
            }
            assert_eq!(
                FsmEvent::observed(to),
                event,
                "observed event {event} must land in its own state, got {to}"
            );
        }
    }

    #[test]
    fn table_has_no_duplicate_rows() {
        for (i, &(from_a, ev_a, _)) in TRANSITIONS.iter().enumerate() {
            for &(from_b, ev_b, _) in &TRANSITIONS[i + 1..] {
                assert!(
                    !(from_a == from_b && ev_a == ev_b),
                    "duplicate transition for ({from_a}, {ev_a})"
                );
            }
        }
    }
}
