// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bookkeeping for every live conversation in the gateway.
//!
//! The manager owns the conversation table, hands out monotonically
//! increasing ids, enforces the one-active-per-identity rule, and runs one
//! watchdog task per conversation to fire idle expiry. All table access goes
//! through a single mutex; watchdogs take the lock only long enough to read
//! a deadline.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_core::{
    types::ScopeMode, ConversationId, Identity, InboundMessage, OutboundMessage,
};

use crate::conversation::{Conversation, Lifecycle, Status};
use crate::schema::ConversationSchema;

/// Why a conversation-control request could not be honored. Rendered to the
/// user verbatim, so messages stay conversational.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerDenial {
    #[error("You don't have an active conversation right now.")]
    NoActive,
    #[error("Finish or pause your current conversation first.")]
    AlreadyActive,
    #[error("You don't have any paused conversations to resume.")]
    NothingPaused,
    #[error("I couldn't find conversation {0}.")]
    NotFound(ConversationId),
    #[error("Conversation {0} belongs to someone else.")]
    NotYours(ConversationId),
}

/// What a turn produced: messages to send, plus a terminal outcome when the
/// active conversation finished this turn.
#[derive(Debug, Default)]
pub struct TurnOutput {
    pub outbound: Vec<OutboundMessage>,
    pub outcome: Option<Lifecycle>,
}

/// A line in the `conversations` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub name: String,
    pub integration: String,
    pub status: Status,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

struct ManagerState {
    conversations: BTreeMap<u64, Conversation>,
    /// Identity -> id of its single active conversation.
    active: HashMap<Identity, u64>,
    watchdogs: HashMap<u64, CancellationToken>,
}

/// Central conversation table. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ConversationManager {
    scope: ScopeMode,
    expiry: Duration,
    skip_keyword: String,
    next_id: Arc<AtomicU64>,
    pause_seq: Arc<AtomicU64>,
    state: Arc<Mutex<ManagerState>>,
    expired_tx: mpsc::UnboundedSender<ConversationId>,
}

impl ConversationManager {
    /// Build a manager. Expired conversation ids arrive on the returned
    /// receiver; the caller settles them with [`expire`].
    ///
    /// [`expire`]: ConversationManager::expire
    pub fn new(
        scope: ScopeMode,
        expiry: Duration,
        skip_keyword: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationId>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let manager = Self {
            scope,
            expiry,
            skip_keyword: skip_keyword.into(),
            next_id: Arc::new(AtomicU64::new(1)),
            pause_seq: Arc::new(AtomicU64::new(1)),
            state: Arc::new(Mutex::new(ManagerState {
                conversations: BTreeMap::new(),
                active: HashMap::new(),
                watchdogs: HashMap::new(),
            })),
            expired_tx,
        };
        (manager, expired_rx)
    }

    /// The identity key for a message under this manager's scope mode.
    pub fn identity_of(&self, msg: &InboundMessage) -> Identity {
        Identity::scoped(self.scope, &msg.user_id, &msg.room_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Start a new conversation for the message's identity. Any currently
    /// active conversation for that identity is paused first, so it can be
    /// resumed once the new one finishes.
    pub fn begin(
        &self,
        name: impl Into<String>,
        integration: impl Into<String>,
        schema: Option<ConversationSchema>,
        trigger: &InboundMessage,
    ) -> (ConversationId, TurnOutput) {
        let identity = self.identity_of(trigger);
        let id = ConversationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = name.into();

        let mut conv = Conversation::new(
            id,
            name.clone(),
            integration,
            identity.clone(),
            schema,
            trigger,
            self.expiry,
            &self.skip_keyword,
        );

        let mut output = TurnOutput::default();
        let outcome = conv.start();
        output.outbound = conv.drain_outbox();

        let mut state = self.lock();
        info!(id = %id, name = name.as_str(), identity = %identity, "conversation started");

        match outcome {
            // Degenerate dialog that finished during start (e.g. the schema
            // had zero remaining work). It never enters the table and the
            // previous conversation stays active.
            Some(lifecycle) => output.outcome = Some(lifecycle),
            None => {
                if let Some(&previous) = state.active.get(&identity) {
                    let seq = self.pause_seq.fetch_add(1, Ordering::Relaxed);
                    if let Some(prev) = state.conversations.get_mut(&previous) {
                        prev.pause(seq);
                    }
                }
                state.active.insert(identity, id.0);
                state.conversations.insert(id.0, conv);
                let token = self.spawn_watchdog(id);
                state.watchdogs.insert(id.0, token);
            }
        }

        (id, output)
    }

    /// Run a closure against the active conversation for an identity.
    /// Integrations use this to register custom choices or record answers.
    pub fn with_active<R>(
        &self,
        identity: &Identity,
        f: impl FnOnce(&mut Conversation) -> R,
    ) -> Result<R, ManagerDenial> {
        let mut state = self.lock();
        let id = *state.active.get(identity).ok_or(ManagerDenial::NoActive)?;
        let conv = state
            .conversations
            .get_mut(&id)
            .ok_or(ManagerDenial::NoActive)?;
        Ok(f(conv))
    }

    /// Whether the identity has an active conversation.
    pub fn has_active(&self, identity: &Identity) -> bool {
        self.lock().active.contains_key(identity)
    }

    /// Route an inbound message to its identity's active conversation.
    /// Returns `None` when no conversation is listening, in which case the
    /// message falls through to command routing.
    pub fn deliver(&self, msg: &InboundMessage) -> Option<TurnOutput> {
        let identity = self.identity_of(msg);
        let mut state = self.lock();
        let id = *state.active.get(&identity)?;
        let conv = state.conversations.get_mut(&id)?;

        let outcome = conv.receive_message(msg);
        let mut output = TurnOutput {
            outbound: conv.drain_outbox(),
            outcome: outcome.clone(),
        };

        if outcome.is_some() {
            output
                .outbound
                .extend(Self::remove_locked(&mut state, id, &identity));
        }
        Some(output)
    }

    /// Pause the identity's active conversation without starting a new one.
    pub fn pause(&self, identity: &Identity) -> Result<ConversationId, ManagerDenial> {
        let mut state = self.lock();
        let id = state
            .active
            .remove(identity)
            .ok_or(ManagerDenial::NoActive)?;
        let seq = self.pause_seq.fetch_add(1, Ordering::Relaxed);
        if let Some(conv) = state.conversations.get_mut(&id) {
            conv.pause(seq);
        }
        Ok(ConversationId(id))
    }

    /// Resume the identity's most recently paused conversation. Fails if the
    /// identity still has an active one, or has nothing paused.
    pub fn resume(&self, identity: &Identity) -> Result<TurnOutput, ManagerDenial> {
        let mut state = self.lock();
        if state.active.contains_key(identity) {
            return Err(ManagerDenial::AlreadyActive);
        }
        let id = Self::latest_paused(&state, identity).ok_or(ManagerDenial::NothingPaused)?;
        Self::activate_locked(&mut state, id, identity)
    }

    /// Resume a specific paused conversation by id. The caller's identity
    /// must match the conversation's.
    pub fn resume_id(
        &self,
        identity: &Identity,
        id: ConversationId,
    ) -> Result<TurnOutput, ManagerDenial> {
        let mut state = self.lock();
        let conv = state
            .conversations
            .get(&id.0)
            .ok_or(ManagerDenial::NotFound(id))?;
        if conv.identity() != identity {
            return Err(ManagerDenial::NotYours(id));
        }
        if let Some(&active) = state.active.get(identity) {
            if active != id.0 {
                let seq = self.pause_seq.fetch_add(1, Ordering::Relaxed);
                if let Some(prev) = state.conversations.get_mut(&active) {
                    prev.pause(seq);
                }
            }
        }
        Self::activate_locked(&mut state, id.0, identity)
    }

    /// Cancel the identity's active conversation. The most recently paused
    /// sibling, if any, becomes active again.
    pub fn cancel(&self, identity: &Identity) -> Result<TurnOutput, ManagerDenial> {
        let mut state = self.lock();
        let id = *state.active.get(identity).ok_or(ManagerDenial::NoActive)?;
        info!(id, identity = %identity, "conversation cancelled");
        let outbound = Self::remove_locked(&mut state, id, identity);
        Ok(TurnOutput {
            outbound,
            outcome: Some(Lifecycle::Close),
        })
    }

    /// Cancel a specific conversation (active or paused) owned by the
    /// identity.
    pub fn cancel_id(
        &self,
        identity: &Identity,
        id: ConversationId,
    ) -> Result<TurnOutput, ManagerDenial> {
        let mut state = self.lock();
        let conv = state
            .conversations
            .get(&id.0)
            .ok_or(ManagerDenial::NotFound(id))?;
        if conv.identity() != identity {
            return Err(ManagerDenial::NotYours(id));
        }
        info!(id = id.0, identity = %identity, "conversation cancelled");
        let outbound = Self::remove_locked(&mut state, id.0, identity);
        Ok(TurnOutput {
            outbound,
            outcome: Some(Lifecycle::Close),
        })
    }

    /// Cancel every conversation belonging to the identity. Returns how many
    /// were removed.
    pub fn cancel_all(&self, identity: &Identity) -> usize {
        let mut state = self.lock();
        let ids: Vec<u64> = state
            .conversations
            .iter()
            .filter(|(_, c)| c.identity() == identity)
            .map(|(&id, _)| id)
            .collect();
        let count = ids.len();
        for id in ids {
            Self::drop_conversation(&mut state, id);
        }
        state.active.remove(identity);
        if count > 0 {
            info!(identity = %identity, count, "all conversations cancelled");
        }
        count
    }

    /// Pause every conversation belonging to the identity, including the
    /// active one. Returns how many were paused.
    pub fn pause_all(&self, identity: &Identity) -> usize {
        let mut state = self.lock();
        state.active.remove(identity);
        let ids: Vec<u64> = state
            .conversations
            .values()
            .filter(|c| c.identity() == identity && c.status() == Status::Active)
            .map(|c| c.id().0)
            .collect();
        let count = ids.len();
        for id in ids {
            let seq = self.pause_seq.fetch_add(1, Ordering::Relaxed);
            if let Some(conv) = state.conversations.get_mut(&id) {
                conv.pause(seq);
            }
        }
        count
    }

    /// Settle an expiry event from a watchdog. Returns the notice to send if
    /// the conversation was still present and genuinely past its deadline.
    pub fn expire(&self, id: ConversationId) -> Option<Vec<OutboundMessage>> {
        let mut state = self.lock();
        let conv = state.conversations.get(&id.0)?;
        if conv.deadline() > Instant::now() {
            // The deadline moved between the watchdog firing and us taking
            // the lock; the conversation lives on.
            return None;
        }
        let identity = conv.identity().clone();
        let name = conv.name().to_string();
        warn!(id = %id, identity = %identity, name = name.as_str(), "conversation expired");

        let mut conv = state
            .conversations
            .remove(&id.0)
            .expect("checked present above");
        if state.active.get(&identity) == Some(&id.0) {
            state.active.remove(&identity);
        }
        if let Some(token) = state.watchdogs.remove(&id.0) {
            token.cancel();
        }

        conv.say(format!("`{name}` timed out and was discarded."));
        let mut outbound = conv.drain_outbox();
        outbound.extend(Self::resume_sibling_locked(&mut state, &identity));
        Some(outbound)
    }

    /// List the identity's conversations, active first, then paused newest
    /// first.
    pub fn list(&self, identity: &Identity) -> Vec<ConversationSummary> {
        let state = self.lock();
        let mut rows: Vec<(Option<u64>, ConversationSummary)> = state
            .conversations
            .values()
            .filter(|c| c.identity() == identity)
            .map(|c| {
                (
                    c.pause_seq(),
                    ConversationSummary {
                        id: c.id(),
                        name: c.name().to_string(),
                        integration: c.integration().to_string(),
                        status: c.status(),
                        started_at: c.started_at(),
                    },
                )
            })
            .collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| match (a.status, b.status) {
            (Status::Active, Status::Paused) => std::cmp::Ordering::Less,
            (Status::Paused, Status::Active) => std::cmp::Ordering::Greater,
            _ => b_seq.cmp(a_seq),
        });
        rows.into_iter().map(|(_, row)| row).collect()
    }

    /// Total conversations in the table, across all identities.
    pub fn len(&self) -> usize {
        self.lock().conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().conversations.is_empty()
    }

    /// Cancel every watchdog. Called on gateway shutdown.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        for (_, token) in state.watchdogs.drain() {
            token.cancel();
        }
        state.conversations.clear();
        state.active.clear();
    }

    fn latest_paused(state: &ManagerState, identity: &Identity) -> Option<u64> {
        state
            .conversations
            .values()
            .filter(|c| c.identity() == identity && c.status() == Status::Paused)
            .max_by_key(|c| c.pause_seq())
            .map(|c| c.id().0)
    }

    fn activate_locked(
        state: &mut ManagerState,
        id: u64,
        identity: &Identity,
    ) -> Result<TurnOutput, ManagerDenial> {
        let conv = state
            .conversations
            .get_mut(&id)
            .ok_or(ManagerDenial::NotFound(ConversationId(id)))?;
        conv.resume();
        conv.touch();
        if let Some(question) = conv.last_question() {
            let question = question.to_string();
            conv.say(format!("Resuming `{}`. {question}", conv.name()));
        } else {
            let name = conv.name().to_string();
            conv.say(format!("Resuming `{name}`."));
        }
        let outbound = conv.drain_outbox();
        state.active.insert(identity.clone(), id);
        Ok(TurnOutput {
            outbound,
            outcome: None,
        })
    }

    /// Remove a finished conversation and reactivate its most recently
    /// paused sibling. Returns any resume prompt to send.
    fn remove_locked(
        state: &mut ManagerState,
        id: u64,
        identity: &Identity,
    ) -> Vec<OutboundMessage> {
        Self::drop_conversation(state, id);
        if state.active.get(identity) == Some(&id) {
            state.active.remove(identity);
            return Self::resume_sibling_locked(state, identity);
        }
        Vec::new()
    }

    fn resume_sibling_locked(state: &mut ManagerState, identity: &Identity) -> Vec<OutboundMessage> {
        match Self::latest_paused(state, identity) {
            Some(next) => Self::activate_locked(state, next, identity)
                .map(|t| t.outbound)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn drop_conversation(state: &mut ManagerState, id: u64) {
        state.conversations.remove(&id);
        if let Some(token) = state.watchdogs.remove(&id) {
            token.cancel();
        }
    }

    /// One watchdog task per conversation. Sleeps until the recorded
    /// deadline, then rechecks it: activity pushes deadlines forward, so the
    /// task loops until the deadline truly lapsed or it is cancelled.
    fn spawn_watchdog(&self, id: ConversationId) -> CancellationToken {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let state = Arc::clone(&self.state);
        let tx = self.expired_tx.clone();

        tokio::spawn(async move {
            loop {
                let deadline = {
                    let state = state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    match state.conversations.get(&id.0) {
                        Some(conv) => conv.deadline(),
                        None => return,
                    }
                };
                tokio::select! {
                    _ = task_token.cancelled() => return,
                    _ = tokio::time::sleep_until(deadline) => {}
                }
                let lapsed = {
                    let state = state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                    match state.conversations.get(&id.0) {
                        Some(conv) => conv.deadline() <= Instant::now(),
                        None => return,
                    }
                };
                if lapsed {
                    debug!(id = %id, "idle deadline lapsed");
                    let _ = tx.send(id);
                    return;
                }
            }
        });

        token
    }
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("scope", &self.scope)
            .field("conversations", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AnswerKind, AnswerSpec, ConversationSchema, SchemaSpec, StepSpec};

    fn msg(user: &str, room: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            channel: "mock".into(),
            user_id: user.into(),
            room_id: room.into(),
            text: text.into(),
            nlu: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn text_step(question: String) -> StepSpec {
        StepSpec {
            question,
            required: true,
            answer: AnswerSpec {
                kind: AnswerKind::Text,
                options: Vec::new(),
                validation: None,
                entity_name: None,
                default: None,
            },
        }
    }

    fn one_text_step(name: &str) -> ConversationSchema {
        ConversationSchema::compile(
            SchemaSpec::Dynamic {
                name: name.into(),
                steps: vec![text_step(format!("{name}?"))],
            },
            &[],
        )
        .unwrap()
    }

    fn two_text_steps(name: &str) -> ConversationSchema {
        ConversationSchema::compile(
            SchemaSpec::Dynamic {
                name: name.into(),
                steps: vec![
                    text_step(format!("{name} first?")),
                    text_step(format!("{name} second?")),
                ],
            },
            &[],
        )
        .unwrap()
    }

    fn manager(scope: ScopeMode) -> ConversationManager {
        ConversationManager::new(scope, Duration::from_secs(600), "skip").0
    }

    #[tokio::test]
    async fn ids_increase_monotonically() {
        let mgr = manager(ScopeMode::User);
        let (a, _) = mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));
        let (b, _) = mgr.begin("b", "ops", Some(one_text_step("b")), &msg("u2", "r1", "go"));
        assert!(b > a);
    }

    #[tokio::test]
    async fn second_conversation_pauses_the_first() {
        let mgr = manager(ScopeMode::User);
        let trigger = msg("u1", "r1", "go");
        let (first, _) = mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        mgr.begin("b", "ops", Some(one_text_step("b")), &trigger);

        let identity = mgr.identity_of(&trigger);
        let rows = mgr.list(&identity);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, Status::Active);
        assert_eq!(rows[1].id, first);
        assert_eq!(rows[1].status, Status::Paused);
    }

    #[tokio::test]
    async fn finishing_a_conversation_resumes_the_paused_sibling() {
        let mgr = manager(ScopeMode::User);
        let trigger = msg("u1", "r1", "go");
        mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        mgr.begin("b", "ops", Some(one_text_step("b")), &trigger);

        let output = mgr.deliver(&msg("u1", "r1", "answer for b")).unwrap();
        assert!(matches!(output.outcome, Some(Lifecycle::End(_))));
        assert!(
            output.outbound.iter().any(|m| m.text.contains("Resuming `a`")),
            "sibling resume prompt sent: {:?}",
            output.outbound
        );
        // Sibling is active again and receives the next message.
        let output = mgr.deliver(&msg("u1", "r1", "answer for a")).unwrap();
        assert!(matches!(output.outcome, Some(Lifecycle::End(_))));
        assert!(mgr.is_empty());
    }

    #[tokio::test]
    async fn cancel_active_resumes_most_recently_paused() {
        let mgr = manager(ScopeMode::User);
        let trigger = msg("u1", "r1", "go");
        mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        mgr.begin("b", "ops", Some(one_text_step("b")), &trigger);
        mgr.begin("c", "ops", Some(one_text_step("c")), &trigger);

        let identity = mgr.identity_of(&trigger);
        let output = mgr.cancel(&identity).unwrap();
        // b was paused after a, so b comes back.
        assert!(output.outbound.iter().any(|m| m.text.contains("Resuming `b`")));
    }

    #[tokio::test]
    async fn cancel_without_active_is_denied() {
        let mgr = manager(ScopeMode::User);
        let identity = Identity("u1&r1".into());
        assert!(matches!(mgr.cancel(&identity), Err(ManagerDenial::NoActive)));
        assert_eq!(
            mgr.cancel(&identity).unwrap_err().to_string(),
            "You don't have an active conversation right now."
        );
    }

    #[tokio::test]
    async fn resume_requires_something_paused() {
        let mgr = manager(ScopeMode::User);
        let identity = Identity("u1".into());
        assert!(matches!(
            mgr.resume(&identity),
            Err(ManagerDenial::NothingPaused)
        ));
    }

    #[tokio::test]
    async fn resume_with_an_active_conversation_is_refused() {
        let mgr = manager(ScopeMode::User);
        let trigger = msg("u1", "r1", "go");
        mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        let identity = mgr.identity_of(&trigger);

        let denial = mgr.resume(&identity).unwrap_err();
        assert_eq!(denial, ManagerDenial::AlreadyActive);
        assert_eq!(
            denial.to_string(),
            "Finish or pause your current conversation first."
        );
    }

    #[tokio::test]
    async fn pause_then_resume_reasks_the_open_question() {
        let mgr = manager(ScopeMode::User);
        let trigger = msg("u1", "r1", "go");
        mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        let identity = mgr.identity_of(&trigger);

        mgr.pause(&identity).unwrap();
        assert!(mgr.deliver(&msg("u1", "r1", "hello")).is_none());

        let output = mgr.resume(&identity).unwrap();
        assert!(output.outbound[0].text.contains("a?"));
    }

    #[tokio::test]
    async fn room_scope_shares_one_conversation_per_room() {
        let mgr = manager(ScopeMode::Room);
        mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));

        // A different user in the same room reaches the same conversation.
        let output = mgr.deliver(&msg("u2", "r1", "answer")).unwrap();
        assert!(matches!(output.outcome, Some(Lifecycle::End(_))));
    }

    #[tokio::test]
    async fn user_scope_isolates_rooms_from_each_other_only_by_user() {
        let mgr = manager(ScopeMode::User);
        mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));

        assert!(mgr.deliver(&msg("u2", "r1", "answer")).is_none());
    }

    #[tokio::test]
    async fn cancel_all_empties_the_identity() {
        let mgr = manager(ScopeMode::User);
        let trigger = msg("u1", "r1", "go");
        mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        mgr.begin("b", "ops", Some(one_text_step("b")), &trigger);
        mgr.begin("other", "ops", Some(one_text_step("x")), &msg("u2", "r1", "go"));

        let identity = mgr.identity_of(&trigger);
        assert_eq!(mgr.cancel_all(&identity), 2);
        assert_eq!(mgr.len(), 1);
    }

    #[tokio::test]
    async fn cancel_id_rejects_other_identities() {
        let mgr = manager(ScopeMode::User);
        let (id, _) = mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));
        let stranger = Identity("u2".into());
        assert!(matches!(
            mgr.cancel_id(&stranger, id),
            Err(ManagerDenial::NotYours(other)) if other == id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_conversation_expires_after_deadline() {
        let (mgr, mut expired) =
            ConversationManager::new(ScopeMode::User, Duration::from_secs(10), "skip");
        let (id, _) = mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));

        tokio::time::advance(Duration::from_secs(11)).await;
        let fired = expired.recv().await.unwrap();
        assert_eq!(fired, id);

        let outbound = mgr.expire(fired).unwrap();
        assert!(outbound[0].text.contains("timed out"));
        assert!(mgr.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_defers_expiry() {
        let (mgr, mut expired) =
            ConversationManager::new(ScopeMode::User, Duration::from_secs(10), "skip");
        mgr.begin("a", "ops", Some(two_text_steps("a")), &msg("u1", "r1", "go"));

        // Answering the first step half-way through the window pushes the
        // deadline out while the conversation stays open on step two.
        tokio::time::advance(Duration::from_secs(6)).await;
        let turn = mgr.deliver(&msg("u1", "r1", "first answer")).unwrap();
        assert!(turn.outcome.is_none(), "conversation still open");
        assert_eq!(mgr.len(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(expired.try_recv().is_err(), "no expiry after activity");

        // Left alone, it still expires at the refreshed deadline.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(expired.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_expiry_event_is_ignored() {
        let (mgr, _rx) = ConversationManager::new(ScopeMode::User, Duration::from_secs(10), "skip");
        let (id, _) = mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));

        // Deadline still in the future: a spurious event settles to nothing.
        assert!(mgr.expire(id).is_none());
        assert_eq!(mgr.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_conversations_still_expire() {
        let (mgr, mut expired) =
            ConversationManager::new(ScopeMode::User, Duration::from_secs(10), "skip");
        let trigger = msg("u1", "r1", "go");
        let (id, _) = mgr.begin("a", "ops", Some(one_text_step("a")), &trigger);
        mgr.pause(&mgr.identity_of(&trigger)).unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(expired.recv().await.unwrap(), id);
    }

    #[tokio::test]
    async fn shutdown_clears_everything() {
        let mgr = manager(ScopeMode::User);
        mgr.begin("a", "ops", Some(one_text_step("a")), &msg("u1", "r1", "go"));
        mgr.shutdown();
        assert!(mgr.is_empty());
    }
}
