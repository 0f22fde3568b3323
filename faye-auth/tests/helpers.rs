//! Shared test collaborators for faye-auth integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use faye_auth::{
    AuthError, AuthRequest, AuthenticationGate, Authenticator, Credential, ErrorReporter,
    GateOptions, Message, PubSubClient,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("faye_auth=debug,faye_auth_core=debug")
            .with_test_writer()
            .init();
    });
}

/// Client double recording every message the gate forwards
#[derive(Default)]
pub struct RecordingClient {
    client_id: Mutex<Option<String>>,
    forwarded: Mutex<Vec<Message>>,
}

impl RecordingClient {
    pub fn with_client_id(client_id: &str) -> Self {
        Self {
            client_id: Mutex::new(Some(client_id.to_string())),
            forwarded: Mutex::new(Vec::new()),
        }
    }

    pub fn forwarded(&self) -> Vec<Message> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn forwarded_channels(&self) -> Vec<String> {
        self.forwarded().into_iter().map(|m| m.channel).collect()
    }
}

impl PubSubClient for RecordingClient {
    fn client_id(&self) -> Option<String> {
        self.client_id.lock().unwrap().clone()
    }

    fn forward(&self, message: Message) {
        self.forwarded.lock().unwrap().push(message);
    }
}

/// Authenticator answering from a script, one entry per attempt
///
/// Once the script runs out every further attempt succeeds with `"sig"`.
pub struct ScriptedAuthenticator {
    script: Mutex<VecDeque<Result<Credential, AuthError>>>,
    latency: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, AuthRequest)>>,
}

impl ScriptedAuthenticator {
    pub fn new(latency: Duration, script: Vec<Result<Credential, AuthError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            latency,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, AuthRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    async fn authenticate(
        &self,
        endpoint: &str,
        request: &AuthRequest,
    ) -> Result<Credential, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((endpoint.to_string(), request.clone()));

        tokio::time::sleep(self.latency).await;

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Credential::new("sig")))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    pub errors: Mutex<Vec<String>>,
}

impl ErrorReporter for RecordingReporter {
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

pub fn network_failure() -> Result<Credential, AuthError> {
    Err(AuthError::network("connection refused"))
}

pub fn signed(token: &str) -> Result<Credential, AuthError> {
    Ok(Credential::new(token))
}

pub fn build_gate(
    client: &Arc<RecordingClient>,
    authenticator: &Arc<ScriptedAuthenticator>,
    options: GateOptions,
) -> AuthenticationGate {
    init_logging();
    AuthenticationGate::new(client.clone(), authenticator.clone(), None, options)
}

/// Advance the paused clock by `ms` milliseconds, letting spawned tasks run
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
