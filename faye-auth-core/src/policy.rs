//! Authorization policy
//!
//! Decides, per message, whether a valid authentication session is required
//! before the message may be delivered. Only publish and subscribe traffic is
//! ever protected; connection-management meta messages always pass so that a
//! client can reach the point where it is able to authenticate.

use crate::error::WhitelistError;
use crate::traits::{ErrorReporter, NoopReporter};
use crate::types::{Message, MessageCategory};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type WhitelistFn = dyn Fn(&str) -> Result<bool, WhitelistError> + Send + Sync;

/// Predicate exempting subjects from authentication.
///
/// Returning `true` means the subject is trusted and needs no session.
#[derive(Clone)]
pub struct Whitelist(Arc<WhitelistFn>);

impl Whitelist {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |subject: &str| Ok(predicate(subject))))
    }

    /// Whitelist whose evaluation can fail
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> Result<bool, WhitelistError> + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn evaluate(&self, subject: &str) -> Result<bool, WhitelistError> {
        (self.0)(subject)
    }
}

impl fmt::Debug for Whitelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Whitelist(<fn>)")
    }
}

/// Classifies messages as requiring authentication or not
#[derive(Clone)]
pub struct AuthorizationPolicy {
    whitelist: Option<Whitelist>,
    reporter: Arc<dyn ErrorReporter>,
}

impl fmt::Debug for AuthorizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationPolicy")
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self::new(None, Arc::new(NoopReporter))
    }
}

impl AuthorizationPolicy {
    pub fn new(whitelist: Option<Whitelist>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            whitelist,
            reporter,
        }
    }

    pub fn whitelist(&self) -> Option<&Whitelist> {
        self.whitelist.as_ref()
    }

    pub fn set_whitelist(&mut self, whitelist: Option<Whitelist>) {
        self.whitelist = whitelist;
    }

    /// Whether `message` needs an authenticated session before delivery
    pub fn authentication_required(&self, message: &Message) -> bool {
        let category = message.category();

        // The whitelist may only exempt protected traffic, never add to it.
        if !category.is_protected() {
            return false;
        }

        let Some(whitelist) = &self.whitelist else {
            return true;
        };

        let subject = message.subject();
        match whitelist.evaluate(subject) {
            Ok(trusted) => {
                debug!(
                    channel = %message.channel,
                    subject = subject,
                    trusted = trusted,
                    "Whitelist evaluated"
                );
                !trusted
            }
            Err(e) => {
                self.reporter.error(&format!(
                    "Error caught when evaluating whitelist function : {}",
                    e
                ));
                Self::default_for(category)
            }
        }
    }

    fn default_for(category: MessageCategory) -> bool {
        category.is_protected()
    }
}
