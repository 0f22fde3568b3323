//! Faye Auth - Message-level authentication gate for pub/sub clients
//!
//! The gate decides per outgoing message whether an authenticated session is
//! needed, holds protected messages while one is being established, and
//! retries failed attempts at a fixed interval until one succeeds.
//!
//! ## Architecture
//!
//! - **Policy** (faye-auth-core): which messages require authentication
//! - **Session** (this crate): per-connection state and held messages
//! - **Gate** (this crate): extension hooks, attempt and retry orchestration
//! - **HTTP** (this crate): a `reqwest` authenticator for the endpoint

pub mod gate;
pub mod http;
pub mod session;

pub use gate::{AuthenticationGate, GateOptions};
pub use http::{HttpAuthenticator, HttpAuthenticatorConfig};
pub use session::{AuthenticationSession, SessionStatus};

pub use faye_auth_core::{
    AuthError, AuthRequest, Authenticator, AuthorizationPolicy, Credential, ErrorReporter,
    Extension, FayeAuthError, FayeAuthResult, GateConfig, Message, MessageCategory,
    NoopReporter, Outgoing, PubSubClient, TracingReporter, Whitelist, WhitelistError,
};
