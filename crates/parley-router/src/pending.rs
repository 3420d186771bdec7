// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-login continuations for the authentication gate.
//!
//! When an auth-gated command arrives without valid credentials, the
//! triggering message is parked here under a one-time login id. The login
//! callback redeems the id, which removes the entry and replays the message.
//! Entries that are never redeemed age out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use parley_core::{InboundMessage, OutboundSink};

/// A parked message waiting for its user to finish logging in.
#[derive(Clone)]
pub struct PendingLogin {
    /// The integration whose gate triggered the login.
    pub integration: String,
    /// The message to replay once credentials arrive.
    pub message: InboundMessage,
    /// Delivery seam captured at dispatch time.
    pub sink: Arc<dyn OutboundSink>,
    created_at: DateTime<Utc>,
}

/// Concurrent store of pending logins keyed by one-time login id.
pub struct PendingLogins {
    entries: DashMap<String, PendingLogin>,
    ttl: chrono::TimeDelta,
}

impl PendingLogins {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX),
        }
    }

    /// Park a message and mint its login id.
    pub fn park(
        &self,
        integration: impl Into<String>,
        message: InboundMessage,
        sink: Arc<dyn OutboundSink>,
    ) -> String {
        let login_id = Uuid::new_v4().to_string();
        self.entries.insert(
            login_id.clone(),
            PendingLogin {
                integration: integration.into(),
                message,
                sink,
                created_at: Utc::now(),
            },
        );
        debug!(login_id = login_id.as_str(), "login parked");
        login_id
    }

    /// Redeem a login id. Returns `None` for unknown or expired ids; either
    /// way the id is single-use.
    pub fn redeem(&self, login_id: &str) -> Option<PendingLogin> {
        let (_, entry) = self.entries.remove(login_id)?;
        if Utc::now() - entry.created_at > self.ttl {
            debug!(login_id, "login expired at redemption");
            return None;
        }
        Some(entry)
    }

    /// Drop every entry past its TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.created_at > cutoff);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "expired pending logins swept");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{MessageId, OutboundMessage, ParleyError};

    struct NullSink;

    #[async_trait::async_trait]
    impl OutboundSink for NullSink {
        async fn deliver(&self, _msg: OutboundMessage) -> Result<MessageId, ParleyError> {
            Ok(MessageId("0".into()))
        }
    }

    fn msg() -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            channel: "mock".into(),
            user_id: "u1".into(),
            room_id: "r1".into(),
            text: "ops deploy".into(),
            nlu: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn redeem_is_single_use() {
        let store = PendingLogins::new(std::time::Duration::from_secs(600));
        let id = store.park("ops", msg(), Arc::new(NullSink));
        assert!(store.redeem(&id).is_some());
        assert!(store.redeem(&id).is_none());
    }

    #[test]
    fn unknown_id_is_rejected() {
        let store = PendingLogins::new(std::time::Duration::from_secs(600));
        assert!(store.redeem("nope").is_none());
    }

    #[test]
    fn expired_entry_fails_redemption() {
        let store = PendingLogins::new(std::time::Duration::ZERO);
        let id = store.park("ops", msg(), Arc::new(NullSink));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.redeem(&id).is_none());
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store = PendingLogins::new(std::time::Duration::ZERO);
        store.park("ops", msg(), Arc::new(NullSink));
        store.park("ops", msg(), Arc::new(NullSink));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(store.sweep(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let store = PendingLogins::new(std::time::Duration::from_secs(600));
        let a = store.park("ops", msg(), Arc::new(NullSink));
        let b = store.park("ops", msg(), Arc::new(NullSink));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
