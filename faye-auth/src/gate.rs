//! Authentication gate
//!
//! Sits in the outgoing extension chain of a pub/sub client. Messages the
//! authorization policy protects are held until the connection has an
//! authenticated session; the gate runs at most one authentication attempt at
//! a time and retries failures at a fixed delay until one succeeds.
//!
//! Hooks are synchronous and may be called from any thread. Attempts and retry
//! timers run as tasks on the tokio runtime the gate was built in (or the one
//! given through [`GateOptions::with_runtime`]).

use crate::session::{AuthenticationSession, SessionStatus};
use faye_auth_core::{
    log_operation_error, log_operation_start, log_operation_success, performance, with_timeout,
    AuthError, AuthRequest, Authenticator, AuthorizationPolicy, Credential, ErrorReporter,
    Extension, FayeAuthError, FayeAuthResult, GateConfig, Message, NoopReporter, Outgoing,
    PubSubClient, ScheduledTask, Whitelist, HANDSHAKE_CHANNEL,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Construction options not covered by the endpoint argument
#[derive(Clone, Default)]
pub struct GateOptions {
    /// Delay between a failed attempt and the next, in milliseconds
    pub retry_delay: Option<u64>,
    /// Bound on one authentication round trip, in milliseconds
    pub request_timeout_ms: Option<u64>,
    pub whitelist: Option<Whitelist>,
    /// Receives recovered errors; discarded when unset
    pub reporter: Option<Arc<dyn ErrorReporter>>,
    /// Runtime that runs attempts; defaults to the one current at construction
    pub runtime: Option<Handle>,
}

impl GateOptions {
    pub fn with_retry_delay(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay = Some(retry_delay_ms);
        self
    }

    pub fn with_request_timeout(mut self, request_timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(request_timeout_ms);
        self
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

struct GateInner {
    endpoint: String,
    retry_delay: Duration,
    request_timeout_ms: u64,
    policy: RwLock<AuthorizationPolicy>,
    client: Arc<dyn PubSubClient>,
    authenticator: Arc<dyn Authenticator>,
    reporter: Arc<dyn ErrorReporter>,
    runtime: Option<Handle>,
    session: Mutex<AuthenticationSession>,
}

/// Holds protected messages until their connection is authenticated
///
/// Clones share one session. Dropping the last clone cancels any pending
/// retry and discards the result of any attempt still in flight.
#[derive(Clone)]
pub struct AuthenticationGate {
    inner: Arc<GateInner>,
}

impl AuthenticationGate {
    pub fn new(
        client: Arc<dyn PubSubClient>,
        authenticator: Arc<dyn Authenticator>,
        endpoint: Option<&str>,
        options: GateOptions,
    ) -> Self {
        let defaults = GateConfig::default();
        let config = GateConfig {
            endpoint: endpoint
                .map(str::to_string)
                .unwrap_or(defaults.endpoint),
            retry_delay: options.retry_delay.unwrap_or(defaults.retry_delay),
            request_timeout_ms: options
                .request_timeout_ms
                .unwrap_or(defaults.request_timeout_ms),
            whitelist: options.whitelist,
        };
        let reporter = options
            .reporter
            .unwrap_or_else(|| Arc::new(NoopReporter));

        Self::build(client, authenticator, config, reporter, options.runtime)
    }

    /// Build from a loaded configuration, validating it first
    pub fn from_config(
        client: Arc<dyn PubSubClient>,
        authenticator: Arc<dyn Authenticator>,
        config: GateConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> FayeAuthResult<Self> {
        config.validate().inspect_err(FayeAuthError::log)?;
        Ok(Self::build(client, authenticator, config, reporter, None))
    }

    fn build(
        client: Arc<dyn PubSubClient>,
        authenticator: Arc<dyn Authenticator>,
        config: GateConfig,
        reporter: Arc<dyn ErrorReporter>,
        runtime: Option<Handle>,
    ) -> Self {
        let session = AuthenticationSession::new(client.client_id());
        let retry_delay = config.retry_delay_duration();
        let runtime = runtime.or_else(|| Handle::try_current().ok());

        debug!(
            endpoint = %config.endpoint,
            retry_delay_ms = config.retry_delay,
            whitelist = config.whitelist.is_some(),
            runtime = runtime.is_some(),
            "Authentication gate created"
        );

        Self {
            inner: Arc::new(GateInner {
                endpoint: config.endpoint,
                retry_delay,
                request_timeout_ms: config.request_timeout_ms,
                policy: RwLock::new(AuthorizationPolicy::new(
                    config.whitelist,
                    Arc::clone(&reporter),
                )),
                client,
                authenticator,
                reporter,
                runtime,
                session: Mutex::new(session),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn retry_delay(&self) -> Duration {
        self.inner.retry_delay
    }

    /// Replace the whitelist; affects decisions made after the call
    pub fn set_whitelist(&self, whitelist: Option<Whitelist>) {
        self.inner
            .policy
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_whitelist(whitelist);
    }

    pub fn authentication_required(&self, message: &Message) -> bool {
        self.inner
            .policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .authentication_required(message)
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock_session().status()
    }

    pub fn held_count(&self) -> usize {
        self.inner.lock_session().held_count()
    }

    pub fn retry_pending(&self) -> bool {
        self.inner.lock_session().retry_pending()
    }

    /// Outgoing hook: forward, attach the credential, or hold
    pub fn outgoing(&self, mut message: Message) -> Outgoing {
        if !self.authentication_required(&message) {
            return Outgoing::Forward(message);
        }

        let mut session = self.inner.lock_session();
        if let Some(credential) = session.credential() {
            message.attach_credential(credential);
            return Outgoing::Forward(message);
        }

        debug!(
            channel = %message.channel,
            subject = message.subject(),
            "Holding message until authenticated"
        );
        session.hold(message);

        // A pending retry will pick the new message up when it fires.
        if !session.retry_pending() {
            GateInner::start_attempt(&self.inner, &mut session);
        }

        Outgoing::Held
    }

    /// Incoming hook: watches for session rejection and connection changes
    pub fn incoming(&self, message: Message) -> Message {
        if message.channel == HANDSHAKE_CHANNEL && message.successful == Some(true) {
            if let Some(client_id) = &message.client_id {
                self.rebind(client_id);
            }
        }

        if let Some(error) = message.error.as_deref() {
            if is_signature_rejection(error) {
                warn!(
                    channel = %message.channel,
                    error = error,
                    "Server rejected session credential"
                );
                self.invalidate();
            }
        }

        message
    }

    /// Drop an established session; the next protected message re-authenticates
    pub fn invalidate(&self) {
        if self.inner.lock_session().invalidate() {
            info!(endpoint = %self.inner.endpoint, "Authentication session invalidated");
        }
    }

    /// Tear the session down.
    ///
    /// Cancels any pending retry, ignores the result of an in-flight attempt
    /// and returns the messages that were still held, oldest first.
    pub fn reset(&self) -> Vec<Message> {
        let returned = self.inner.lock_session().reset();
        info!(returned = returned.len(), "Authentication session reset");
        returned
    }

    fn rebind(&self, client_id: &str) {
        let mut session = self.inner.lock_session();
        if session.client_id() == Some(client_id) {
            return;
        }

        info!(
            previous = ?session.client_id(),
            client_id = client_id,
            "Connection identity changed, starting a new session"
        );
        session.rekey(client_id.to_string());

        if session.held_count() > 0 {
            GateInner::start_attempt(&self.inner, &mut session);
        }
    }
}

impl Extension for AuthenticationGate {
    fn outgoing(&self, message: Message) -> Outgoing {
        AuthenticationGate::outgoing(self, message)
    }

    fn incoming(&self, message: Message) -> Message {
        AuthenticationGate::incoming(self, message)
    }
}

impl GateInner {
    fn lock_session(&self) -> MutexGuard<'_, AuthenticationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runtime for attempt tasks: the one captured at construction, else the
    /// caller's
    fn runtime(&self) -> Option<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    fn start_attempt(inner: &Arc<Self>, session: &mut AuthenticationSession) {
        if session.status() == SessionStatus::Authenticating {
            return;
        }

        // Without a runtime the session stays unauthenticated with its
        // messages held, so a later call from inside one can start the attempt.
        let Some(runtime) = inner.runtime() else {
            warn!(
                endpoint = %inner.endpoint,
                held = session.held_count(),
                "No tokio runtime available, authentication deferred"
            );
            inner.reporter.error(&format!(
                "No tokio runtime available to authenticate against {}; {} message(s) held",
                inner.endpoint,
                session.held_count()
            ));
            return;
        };

        let Some(generation) = session.begin_attempt() else {
            return;
        };

        // After a handshake the session knows the new identity before the
        // client may report it.
        let request = AuthRequest {
            client_id: session
                .client_id()
                .map(str::to_string)
                .or_else(|| inner.client.client_id()),
            subjects: session.held_subjects(),
        };

        log_operation_start!(
            "authenticate",
            endpoint = %inner.endpoint,
            generation = generation,
            held = request.subjects.len()
        );

        let authenticator = Arc::clone(&inner.authenticator);
        let endpoint = inner.endpoint.clone();
        let timeout_ms = inner.request_timeout_ms;
        let weak = Arc::downgrade(inner);

        runtime.spawn(async move {
            let round_trip = with_timeout(
                authenticator.authenticate(&endpoint, &request),
                timeout_ms,
                "authenticate",
            );
            let result = performance::measure_async("authenticate", round_trip).await;

            match weak.upgrade() {
                Some(inner) => Self::finish_attempt(&inner, generation, result),
                None => debug!(generation = generation, "Gate dropped during authentication"),
            }
        });
    }

    fn finish_attempt(
        inner: &Arc<Self>,
        generation: u64,
        result: Result<Credential, AuthError>,
    ) {
        let mut session = inner.lock_session();
        if !session.is_current(generation) {
            debug!(generation = generation, "Discarding stale authentication result");
            return;
        }

        match result {
            Ok(credential) => {
                let released = session.succeed(credential);
                log_operation_success!(
                    "authenticate",
                    generation = generation,
                    released = released.len()
                );
                // Forwarding under the lock keeps released messages ahead of
                // anything produced concurrently.
                for message in released {
                    inner.client.forward(message);
                }
            }
            Err(error) => {
                log_operation_error!(
                    "authenticate",
                    error,
                    generation = generation,
                    held = session.held_count(),
                    retry_delay_ms = inner.retry_delay.as_millis() as u64
                );
                let weak = Arc::downgrade(inner);
                let retry = ScheduledTask::after(inner.retry_delay, move || async move {
                    if let Some(inner) = weak.upgrade() {
                        Self::retry_due(&inner, generation);
                    }
                });
                session.fail(generation, retry);
            }
        }
    }

    fn retry_due(inner: &Arc<Self>, generation: u64) {
        let mut session = inner.lock_session();
        if session.take_retry(generation) {
            debug!(generation = generation, "Retrying authentication");
            Self::start_attempt(inner, &mut session);
        }
    }
}

/// Whether a server error means the attached credential was not accepted
fn is_signature_rejection(error: &str) -> bool {
    error.starts_with("401") || error.to_ascii_lowercase().contains("invalid signature")
}
