//! Per-connection authentication session
//!
//! Tracks where one connection is in the authentication lifecycle together
//! with the messages held until it is authenticated.

use faye_auth_core::{Credential, Message, ScheduledTask};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Externally visible session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

#[derive(Debug)]
enum SessionState {
    /// No valid session. `retry` is armed after a failed attempt.
    Unauthenticated { retry: Option<PendingRetry> },
    Authenticating { generation: u64 },
    Authenticated { credential: Credential },
}

#[derive(Debug)]
struct PendingRetry {
    generation: u64,
    _task: ScheduledTask,
}

/// Authentication state of one connection plus its held messages
#[derive(Debug)]
pub struct AuthenticationSession {
    client_id: Option<String>,
    state: SessionState,
    held: VecDeque<Message>,
    /// Bumped on every attempt and every reset; results tagged with an older
    /// value are stale.
    generation: u64,
}

impl AuthenticationSession {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            client_id,
            state: SessionState::Unauthenticated { retry: None },
            held: VecDeque::new(),
            generation: 0,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Unauthenticated { .. } => SessionStatus::Unauthenticated,
            SessionState::Authenticating { .. } => SessionStatus::Authenticating,
            SessionState::Authenticated { .. } => SessionStatus::Authenticated,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match &self.state {
            SessionState::Authenticated { credential } => Some(credential),
            _ => None,
        }
    }

    pub fn retry_pending(&self) -> bool {
        matches!(
            self.state,
            SessionState::Unauthenticated { retry: Some(_) }
        )
    }

    pub fn hold(&mut self, message: Message) {
        self.held.push_back(message);
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn held_subjects(&self) -> Vec<String> {
        self.held.iter().map(|m| m.subject().to_string()).collect()
    }

    /// Move to `Authenticating` unless an attempt is already in flight.
    ///
    /// Returns the generation tag for the new attempt. A pending retry is
    /// dropped, which cancels it.
    pub fn begin_attempt(&mut self) -> Option<u64> {
        if matches!(self.state, SessionState::Authenticating { .. }) {
            return None;
        }
        self.generation += 1;
        self.state = SessionState::Authenticating {
            generation: self.generation,
        };
        Some(self.generation)
    }

    /// Whether `generation` identifies the attempt currently in flight
    pub fn is_current(&self, generation: u64) -> bool {
        matches!(self.state, SessionState::Authenticating { generation: g } if g == generation)
    }

    /// Record a successful attempt and hand back the held messages, oldest
    /// first, with the credential attached.
    pub fn succeed(&mut self, credential: Credential) -> Vec<Message> {
        let released = self
            .held
            .drain(..)
            .map(|mut message| {
                message.attach_credential(&credential);
                message
            })
            .collect();
        self.state = SessionState::Authenticated { credential };
        released
    }

    /// Record a failed attempt; held messages stay queued until `retry` fires.
    pub fn fail(&mut self, generation: u64, retry: ScheduledTask) {
        self.state = SessionState::Unauthenticated {
            retry: Some(PendingRetry {
                generation,
                _task: retry,
            }),
        };
    }

    /// Claim the retry armed after attempt `generation`.
    ///
    /// Returns false when that retry was superseded in the meantime.
    pub fn take_retry(&mut self, generation: u64) -> bool {
        let due = matches!(
            &self.state,
            SessionState::Unauthenticated { retry: Some(pending) }
                if pending.generation == generation
        );
        if due {
            self.state = SessionState::Unauthenticated { retry: None };
        }
        due
    }

    /// Drop an established session. Held messages are kept.
    pub fn invalidate(&mut self) -> bool {
        if matches!(self.state, SessionState::Authenticated { .. }) {
            self.state = SessionState::Unauthenticated { retry: None };
            true
        } else {
            false
        }
    }

    /// Bind the session to a new connection identity, discarding any
    /// credential, in-flight attempt or pending retry of the old one.
    pub fn rekey(&mut self, client_id: String) {
        self.client_id = Some(client_id);
        self.generation += 1;
        self.state = SessionState::Unauthenticated { retry: None };
    }

    /// Tear the session down and return whatever was still held
    pub fn reset(&mut self) -> Vec<Message> {
        self.generation += 1;
        self.state = SessionState::Unauthenticated { retry: None };
        self.held.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn idle_retry() -> ScheduledTask {
        ScheduledTask::after(Duration::from_secs(3600), || async {})
    }

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = AuthenticationSession::new(Some("c1".to_string()));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(session.client_id(), Some("c1"));
        assert!(session.credential().is_none());
        assert!(!session.retry_pending());
    }

    #[test]
    fn test_only_one_attempt_in_flight() {
        let mut session = AuthenticationSession::new(None);
        let first = session.begin_attempt().expect("first attempt starts");
        assert_eq!(session.begin_attempt(), None);
        assert!(session.is_current(first));
        assert_eq!(session.status(), SessionStatus::Authenticating);
    }

    #[test]
    fn test_success_releases_in_arrival_order() {
        let mut session = AuthenticationSession::new(None);
        session.hold(Message::new("/a"));
        session.hold(Message::new("/b"));
        session.begin_attempt();

        let released = session.succeed(Credential::new("sig"));

        let channels: Vec<_> = released.iter().map(|m| m.channel.as_str()).collect();
        assert_eq!(channels, vec!["/a", "/b"]);
        assert!(released.iter().all(|m| m.signature() == Some("sig")));
        assert_eq!(session.held_count(), 0);
        assert_eq!(session.status(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn test_failure_keeps_messages_and_arms_retry() {
        let mut session = AuthenticationSession::new(None);
        session.hold(Message::new("/a"));
        let generation = session.begin_attempt().unwrap();

        session.fail(generation, idle_retry());

        assert_eq!(session.held_count(), 1);
        assert!(session.retry_pending());
        assert!(!session.take_retry(generation + 1));
        assert!(session.take_retry(generation));
        assert!(!session.retry_pending());
    }

    #[tokio::test]
    async fn test_reset_makes_attempt_stale() {
        let mut session = AuthenticationSession::new(None);
        session.hold(Message::new("/a"));
        let generation = session.begin_attempt().unwrap();

        let returned = session.reset();

        assert_eq!(returned.len(), 1);
        assert!(!session.is_current(generation));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_invalidate_only_affects_authenticated() {
        let mut session = AuthenticationSession::new(None);
        assert!(!session.invalidate());

        session.begin_attempt();
        assert!(!session.invalidate());

        session.succeed(Credential::new("sig"));
        assert!(session.invalidate());
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_rekey_discards_credential() {
        let mut session = AuthenticationSession::new(Some("old".to_string()));
        session.begin_attempt();
        session.succeed(Credential::new("sig"));

        session.rekey("new".to_string());

        assert_eq!(session.client_id(), Some("new"));
        assert!(session.credential().is_none());
    }
}
