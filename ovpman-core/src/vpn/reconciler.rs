//! Connection reconciliation
//!
//! Merges the profile list and the session list, fetched independently,
//! into one record per profile. Sessions carry no reference to their
//! profile beyond the profile's display name, so matching is a linear scan
//! with first-match-wins; two profiles sharing a name will both bind the
//! first matching session.

use crate::types::{ConfigProfile, ConnectionRecord, SessionHandle, unix_now};
use crate::vpn::classifier::StatusClassifier;
use std::collections::HashMap;

/// Builds the reconciled per-profile view.
///
/// Owns the connect-time cache: the creation timestamp of a session is
/// captured the first time its path is seen and reused on every later poll,
/// keeping elapsed-time output stable.
pub struct ConnectionReconciler {
    classifier: StatusClassifier,
    connect_times: HashMap<String, u64>,
}

impl ConnectionReconciler {
    pub fn new() -> Self {
        Self {
            classifier: StatusClassifier::new(),
            connect_times: HashMap::new(),
        }
    }

    /// Merge one poll's profiles and sessions into records sorted by name.
    pub fn reconcile(
        &mut self,
        configs: &[ConfigProfile],
        sessions: &[SessionHandle],
    ) -> Vec<ConnectionRecord> {
        let mut records = Vec::with_capacity(configs.len());

        for config in configs {
            let mut record = ConnectionRecord::disconnected(config);

            if let Some(session) = sessions
                .iter()
                .find(|session| session.config_name == config.name)
            {
                record.session_path = Some(session.session_path.clone());
                if !session.device_name.is_empty() {
                    record.device_name = Some(session.device_name.clone());
                }
                record.state = self.classifier.classify(
                    &session.status,
                    session.connected_to.as_ref(),
                    session.auth_pending,
                );
                record.connect_time = Some(self.connect_time_for(session));
            }

            records.push(record);
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));

        self.connect_times
            .retain(|path, _| sessions.iter().any(|s| s.session_path == *path));

        records
    }

    fn connect_time_for(&mut self, session: &SessionHandle) -> u64 {
        *self
            .connect_times
            .entry(session.session_path.clone())
            .or_insert_with(|| {
                if session.session_created > 0 {
                    session.session_created
                } else {
                    unix_now()
                }
            })
    }
}

impl Default for ConnectionReconciler {
    fn default() -> Self {
        Self::new()
    }
}
