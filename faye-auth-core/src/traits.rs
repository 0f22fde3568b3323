//! Core trait definitions

use crate::error::AuthError;
use crate::types::{AuthRequest, Credential, Message};
use async_trait::async_trait;

/// The pub/sub client a gate is attached to
pub trait PubSubClient: Send + Sync {
    /// Identity of the current connection, assigned by the server at handshake
    fn client_id(&self) -> Option<String>;

    /// Send a previously held message downstream.
    ///
    /// Implementations must bypass the gate here: calling back into the gate
    /// from `forward` would deadlock the release path.
    fn forward(&self, message: Message);
}

/// Sink for errors the gate recovers from locally
pub trait ErrorReporter: Send + Sync {
    fn error(&self, message: &str);
}

/// Discards every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn error(&self, _message: &str) {}
}

/// Forwards reports to `tracing` at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn error(&self, message: &str) {
        tracing::error!(target: "faye_auth", "{}", message);
    }
}

/// Performs the credential exchange against the authentication endpoint
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        endpoint: &str,
        request: &AuthRequest,
    ) -> Result<Credential, AuthError>;
}

/// What an outgoing extension decided for one message
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Send now, possibly modified
    Forward(Message),
    /// Kept by the extension; it will be sent later through [`PubSubClient::forward`]
    Held,
}

impl Outgoing {
    pub fn is_held(&self) -> bool {
        matches!(self, Outgoing::Held)
    }

    pub fn into_message(self) -> Option<Message> {
        match self {
            Outgoing::Forward(message) => Some(message),
            Outgoing::Held => None,
        }
    }
}

/// Interception points a pub/sub client exposes to extensions
pub trait Extension: Send + Sync {
    fn outgoing(&self, message: Message) -> Outgoing;

    fn incoming(&self, message: Message) -> Message {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_reporter_emits_error_event() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingReporter.error("Error caught when evaluating whitelist function : boom");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"));
        assert!(output.contains("faye_auth"));
        assert!(output.contains("Error caught when evaluating whitelist function : boom"));
    }

    #[test]
    fn test_outgoing_into_message() {
        let message = Message::new("/foobar");
        assert_eq!(
            Outgoing::Forward(message.clone()).into_message(),
            Some(message)
        );
        assert_eq!(Outgoing::Held.into_message(), None);
    }
}
