//! Polling scheduler
//!
//! One task owns all mutable state (reconciler caches, FSM instances, the
//! auth dedup set, bandwidth monitors) and drives it from a single
//! `select!` loop over three timers and two channels. Consumers talk to it
//! through [`VpnHandle`]: a watch channel carrying the reconciled view, an
//! event channel for changes, and a command channel for lifecycle actions.
//!
//! The display timer exists for second-granularity elapsed-time output and
//! never touches the bus; only the reconcile and bandwidth timers do.

use crate::bus::VpnBus;
use crate::settings::Settings;
use crate::types::{AttentionSignal, ConnectionRecord, ConnectionState};
use crate::vpn::auth::{url_in_message, AuthTracker, INPUT_TYPE_WEB_AUTH};
use crate::vpn::bandwidth::{BandwidthMonitor, BandwidthRate, BandwidthSample, StatsSource};
use crate::vpn::commands;
use crate::vpn::fsm::{ConnectionFsm, FsmEvent};
use crate::vpn::reconciler::ConnectionReconciler;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Lifecycle commands accepted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpnCommand {
    /// Connect a profile (stale sessions for it are cleared first)
    Connect { config_path: String },
    /// Disconnect a session
    Disconnect { session_path: String },
    /// Pause a session
    Pause { session_path: String, reason: String },
    /// Resume a paused session
    Resume { session_path: String },
    /// Re-probe and surface a session's auth URL
    Authenticate { session_path: String },
    /// Disconnect every live session
    CleanupAll,
    /// Run a reconcile pass now
    Poll,
    /// Stop the scheduler
    Shutdown,
}

/// Change notifications emitted by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum VpnEvent {
    /// The reconciled view changed; carries the full new list
    Connections(Vec<ConnectionRecord>),
    /// One connection moved between states
    StateChanged {
        config_path: String,
        name: String,
        old: ConnectionState,
        new: ConnectionState,
    },
    /// A web-auth URL is waiting for the user
    AuthenticationUrl { session_path: String, url: String },
    /// Fresh throughput figures for a session
    Bandwidth {
        session_path: String,
        rate: BandwidthRate,
    },
    /// Bulk cleanup finished
    CleanupFinished { total: usize, disconnected: usize },
    /// A lifecycle command was rejected by the backend
    CommandFailed {
        action: &'static str,
        reason: String,
    },
    /// Second-granularity tick for elapsed-time display; no bus traffic
    DisplayTick,
}

/// Bandwidth state published for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandwidthSnapshot {
    pub rate: Option<BandwidthRate>,
    /// Newest first
    pub samples: Vec<BandwidthSample>,
}

/// Consumer-side handle to a running scheduler
pub struct VpnHandle {
    commands: mpsc::UnboundedSender<VpnCommand>,
    connections: watch::Receiver<Vec<ConnectionRecord>>,
    bandwidth: watch::Receiver<HashMap<String, BandwidthSnapshot>>,
    events: mpsc::UnboundedReceiver<VpnEvent>,
}

impl VpnHandle {
    /// Sender for lifecycle commands.
    pub fn commands(&self) -> mpsc::UnboundedSender<VpnCommand> {
        self.commands.clone()
    }

    /// Current reconciled view.
    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.connections.borrow().clone()
    }

    /// Watch receiver for the reconciled view.
    pub fn connections_watch(&self) -> watch::Receiver<Vec<ConnectionRecord>> {
        self.connections.clone()
    }

    /// Bandwidth rate and sample history for one session.
    pub fn bandwidth(&self, session_path: &str) -> Option<BandwidthSnapshot> {
        self.bandwidth.borrow().get(session_path).cloned()
    }

    /// Next change event; `None` once the scheduler stopped.
    pub async fn next_event(&mut self) -> Option<VpnEvent> {
        self.events.recv().await
    }
}

/// The polling engine. Built with [`PollScheduler::new`], consumed by
/// [`PollScheduler::run`].
pub struct PollScheduler<B: VpnBus> {
    bus: B,
    reconcile_interval: Duration,
    display_interval: Duration,
    bandwidth_interval: Duration,
    bandwidth_capacity: usize,
    bandwidth_source: StatsSource,

    reconciler: ConnectionReconciler,
    fsms: HashMap<String, ConnectionFsm>,
    /// Last observed state the FSM rejected, per profile path
    rejected: HashMap<String, ConnectionState>,
    auth: AuthTracker,
    monitors: HashMap<String, BandwidthMonitor>,

    records_tx: watch::Sender<Vec<ConnectionRecord>>,
    bandwidth_tx: watch::Sender<HashMap<String, BandwidthSnapshot>>,
    event_tx: mpsc::UnboundedSender<VpnEvent>,
    command_rx: mpsc::UnboundedReceiver<VpnCommand>,
    attention_rx: mpsc::UnboundedReceiver<AttentionSignal>,
}

impl<B: VpnBus> PollScheduler<B> {
    /// Build a scheduler and the handle its consumers use.
    pub fn new(
        bus: B,
        settings: &Settings,
        attention_rx: mpsc::UnboundedReceiver<AttentionSignal>,
    ) -> (Self, VpnHandle) {
        let (records_tx, records_rx) = watch::channel(Vec::new());
        let (bandwidth_tx, bandwidth_rx) = watch::channel(HashMap::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let scheduler = Self {
            bus,
            reconcile_interval: Duration::from_secs(settings.poll.reconcile_secs.max(1)),
            display_interval: Duration::from_secs(settings.poll.display_secs.max(1)),
            bandwidth_interval: Duration::from_secs(settings.poll.bandwidth_secs.max(1)),
            bandwidth_capacity: settings.bandwidth.capacity,
            bandwidth_source: settings.bandwidth.source,
            reconciler: ConnectionReconciler::new(),
            fsms: HashMap::new(),
            rejected: HashMap::new(),
            auth: AuthTracker::new(),
            monitors: HashMap::new(),
            records_tx,
            bandwidth_tx,
            event_tx,
            command_rx,
            attention_rx,
        };

        let handle = VpnHandle {
            commands: command_tx,
            connections: records_rx,
            bandwidth: bandwidth_rx,
            events: event_rx,
        };

        (scheduler, handle)
    }

    /// Run until `Shutdown` arrives or all command senders are gone.
    pub async fn run(mut self) {
        let mut reconcile_timer = interval(self.reconcile_interval);
        let mut display_timer = interval(self.display_interval);
        let mut bandwidth_timer = interval(self.bandwidth_interval);

        // Consume the immediate first ticks; the initial pass below stands
        // in for them.
        reconcile_timer.tick().await;
        display_timer.tick().await;
        bandwidth_timer.tick().await;

        self.reconcile_tick().await;

        loop {
            tokio::select! {
                _ = reconcile_timer.tick() => {
                    self.reconcile_tick().await;
                }

                _ = display_timer.tick() => {
                    let _ = self.event_tx.send(VpnEvent::DisplayTick);
                }

                _ = bandwidth_timer.tick() => {
                    self.bandwidth_tick().await;
                }

                Some(signal) = self.attention_rx.recv() => {
                    self.handle_attention(signal).await;
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(VpnCommand::Shutdown) | None => {
                            info!("scheduler shutting down");
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }
    }

    /// One full reconciliation pass.
    ///
    /// A failed fetch of either collection leaves the previously published
    /// view untouched; stale-but-valid beats empty.
    async fn reconcile_tick(&mut self) {
        let configs = match self.bus.fetch_configs().await {
            Ok(configs) => configs,
            Err(err) => {
                warn!(error = %err, "profile fetch failed, keeping previous view");
                return;
            }
        };

        let sessions = match self.bus.fetch_sessions().await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(error = %err, "session fetch failed, keeping previous view");
                return;
            }
        };

        let mut records = self.reconciler.reconcile(&configs, &sessions);

        for record in &mut records {
            let fsm = self
                .fsms
                .entry(record.config_path.clone())
                .or_insert_with(|| ConnectionFsm::new(&record.name));

            let observed = record.state;
            let settled = fsm.process_event(FsmEvent::observed(observed));

            if settled == observed {
                self.rejected.remove(&record.config_path);
            } else if self.rejected.get(&record.config_path) == Some(&observed) {
                // Second consecutive identical off-table observation: resync
                fsm.force_state(observed);
                self.rejected.remove(&record.config_path);
            } else {
                self.rejected.insert(record.config_path.clone(), observed);
                record.state = settled;
            }
        }

        self.fsms
            .retain(|path, _| records.iter().any(|r| r.config_path == *path));
        self.rejected
            .retain(|path, _| records.iter().any(|r| r.config_path == *path));

        self.auth
            .retain_sessions(|path| sessions.iter().any(|s| s.session_path == path));

        for record in &records {
            let Some(session_path) = record.session_path.as_deref() else {
                continue;
            };

            self.auth.note_state(session_path, record.state);

            if record.state == ConnectionState::AuthRequired
                && !self.auth.is_surfaced(session_path)
            {
                let url = match self.bus.auth_url(session_path).await {
                    Ok(Some(url)) => Some(url),
                    Ok(None) => sessions
                        .iter()
                        .find(|s| s.session_path == session_path)
                        .and_then(|s| url_in_message(&s.status.message))
                        .map(str::to_string),
                    Err(err) => {
                        warn!(session = session_path, error = %err, "auth probe failed");
                        None
                    }
                };

                if let Some(url) = url {
                    info!(session = session_path, url = %url, "authentication required");
                    self.auth.mark_surfaced(session_path);
                    let _ = self.event_tx.send(VpnEvent::AuthenticationUrl {
                        session_path: session_path.to_string(),
                        url,
                    });
                }
            }
        }

        self.publish(records);
    }

    fn publish(&mut self, records: Vec<ConnectionRecord>) {
        let previous = self.records_tx.borrow().clone();
        if previous == records {
            return;
        }

        for record in &records {
            if let Some(old) = previous.iter().find(|r| r.config_path == record.config_path) {
                if old.state != record.state {
                    let _ = self.event_tx.send(VpnEvent::StateChanged {
                        config_path: record.config_path.clone(),
                        name: record.name.clone(),
                        old: old.state,
                        new: record.state,
                    });
                }
            }
        }

        let _ = self.event_tx.send(VpnEvent::Connections(records.clone()));
        self.records_tx.send_replace(records);
    }

    /// Sample counters for every session that has a tunnel device.
    async fn bandwidth_tick(&mut self) {
        let records = self.records_tx.borrow().clone();
        let mut snapshots = HashMap::new();

        for record in &records {
            let (Some(session_path), Some(device)) =
                (record.session_path.as_deref(), record.device_name.as_deref())
            else {
                continue;
            };

            let monitor = self
                .monitors
                .entry(session_path.to_string())
                .or_insert_with(|| {
                    debug!(session = session_path, device, "starting bandwidth monitor");
                    BandwidthMonitor::new(
                        session_path,
                        device,
                        self.bandwidth_source,
                        self.bandwidth_capacity,
                    )
                });

            match monitor.update(&self.bus).await {
                Ok(_) => {
                    let rate = monitor.rate().ok();
                    if let Some(rate) = rate {
                        let _ = self.event_tx.send(VpnEvent::Bandwidth {
                            session_path: session_path.to_string(),
                            rate,
                        });
                    }
                    snapshots.insert(
                        session_path.to_string(),
                        BandwidthSnapshot {
                            rate,
                            samples: monitor.series().samples(monitor.series().len()),
                        },
                    );
                }
                Err(err) => {
                    debug!(session = session_path, error = %err, "bandwidth sample failed");
                }
            }
        }

        self.monitors.retain(|path, _| {
            records
                .iter()
                .any(|r| r.session_path.as_deref() == Some(path.as_str()))
        });

        self.bandwidth_tx.send_replace(snapshots);
    }

    /// An out-of-band attention signal: surface the URL if it carries one,
    /// then reconcile right away instead of waiting for the next poll.
    async fn handle_attention(&mut self, signal: AttentionSignal) {
        info!(
            session = %signal.session_path,
            kind = signal.kind,
            group = signal.group,
            "attention required"
        );

        if signal.kind == INPUT_TYPE_WEB_AUTH && !self.auth.is_surfaced(&signal.session_path) {
            if let Some(url) = url_in_message(&signal.message) {
                self.auth.mark_surfaced(&signal.session_path);
                let _ = self.event_tx.send(VpnEvent::AuthenticationUrl {
                    session_path: signal.session_path.clone(),
                    url: url.to_string(),
                });
            }
        }

        self.reconcile_tick().await;
    }

    async fn handle_command(&mut self, command: VpnCommand) {
        match command {
            VpnCommand::Connect { config_path } => {
                let name = self
                    .records_tx
                    .borrow()
                    .iter()
                    .find(|r| r.config_path == config_path)
                    .map(|r| r.name.clone());

                let Some(name) = name else {
                    let _ = self.event_tx.send(VpnEvent::CommandFailed {
                        action: "connect",
                        reason: format!("unknown profile: {config_path}"),
                    });
                    return;
                };

                match commands::connect(&self.bus, &config_path, &name).await {
                    Ok(_) => {
                        if let Some(fsm) = self.fsms.get_mut(&config_path) {
                            fsm.process_event(FsmEvent::ConnectRequested);
                        }
                    }
                    Err(err) => {
                        let _ = self.event_tx.send(VpnEvent::CommandFailed {
                            action: "connect",
                            reason: err.to_string(),
                        });
                    }
                }
                self.reconcile_tick().await;
            }

            VpnCommand::Disconnect { session_path } => {
                if let Err(err) = commands::disconnect(&self.bus, &session_path).await {
                    let _ = self.event_tx.send(VpnEvent::CommandFailed {
                        action: "disconnect",
                        reason: err.to_string(),
                    });
                } else if let Some(fsm) = self.fsm_for_session(&session_path) {
                    fsm.process_event(FsmEvent::DisconnectRequested);
                }
                self.reconcile_tick().await;
            }

            VpnCommand::Pause {
                session_path,
                reason,
            } => {
                if let Err(err) = commands::pause(&self.bus, &session_path, &reason).await {
                    let _ = self.event_tx.send(VpnEvent::CommandFailed {
                        action: "pause",
                        reason: err.to_string(),
                    });
                }
                self.reconcile_tick().await;
            }

            VpnCommand::Resume { session_path } => {
                if let Err(err) = commands::resume(&self.bus, &session_path).await {
                    let _ = self.event_tx.send(VpnEvent::CommandFailed {
                        action: "resume",
                        reason: err.to_string(),
                    });
                }
                self.reconcile_tick().await;
            }

            VpnCommand::Authenticate { session_path } => match self
                .bus
                .auth_url(&session_path)
                .await
            {
                Ok(Some(url)) => {
                    self.auth.mark_surfaced(&session_path);
                    let _ = self.event_tx.send(VpnEvent::AuthenticationUrl { session_path, url });
                }
                Ok(None) => {
                    let _ = self.event_tx.send(VpnEvent::CommandFailed {
                        action: "authenticate",
                        reason: "no authentication pending".to_string(),
                    });
                }
                Err(err) => {
                    let _ = self.event_tx.send(VpnEvent::CommandFailed {
                        action: "authenticate",
                        reason: err.to_string(),
                    });
                }
            },

            VpnCommand::CleanupAll => {
                match commands::cleanup_all(&self.bus).await {
                    Ok(report) => {
                        let _ = self.event_tx.send(VpnEvent::CleanupFinished {
                            total: report.total,
                            disconnected: report.disconnected,
                        });
                    }
                    Err(err) => {
                        let _ = self.event_tx.send(VpnEvent::CommandFailed {
                            action: "cleanup",
                            reason: err.to_string(),
                        });
                    }
                }
                self.reconcile_tick().await;
            }

            VpnCommand::Poll => {
                self.reconcile_tick().await;
            }

            // Handled in the run loop
            VpnCommand::Shutdown => {}
        }
    }

    fn fsm_for_session(&mut self, session_path: &str) -> Option<&mut ConnectionFsm> {
        let config_path = self
            .records_tx
            .borrow()
            .iter()
            .find(|r| r.session_path.as_deref() == Some(session_path))
            .map(|r| r.config_path.clone())?;
        self.fsms.get_mut(&config_path)
    }
}
