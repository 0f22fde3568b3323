//! Core data type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix shared by every protocol-level channel
pub const META_PREFIX: &str = "/meta/";
/// Channel used to subscribe to a topic
pub const SUBSCRIBE_CHANNEL: &str = "/meta/subscribe";
/// Channel used to open a connection
pub const HANDSHAKE_CHANNEL: &str = "/meta/handshake";
/// Key under `ext` that carries the session credential
pub const SIGNATURE_EXT_KEY: &str = "signature";

/// One Bayeux protocol message as seen by client extensions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Channel path, e.g. `/meta/handshake` or `/foobar`
    pub channel: String,
    /// Subscription target, present on subscribe/unsubscribe messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// Connection identity assigned by the server at handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Extension payload; the gate writes the credential here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    /// Create a message on the given channel
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Default::default()
        }
    }

    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Category derived from the channel path
    pub fn category(&self) -> MessageCategory {
        MessageCategory::of(&self.channel)
    }

    /// The string a whitelist is evaluated against: subscription if present, else channel
    pub fn subject(&self) -> &str {
        self.subscription.as_deref().unwrap_or(&self.channel)
    }

    /// Attach a credential under `ext.signature`, keeping any other ext entries
    pub fn attach_credential(&mut self, credential: &Credential) {
        self.ext.get_or_insert_with(Map::new).insert(
            SIGNATURE_EXT_KEY.to_string(),
            Value::String(credential.token.clone()),
        );
    }

    /// Credential previously attached to this message, if any
    pub fn signature(&self) -> Option<&str> {
        self.ext
            .as_ref()
            .and_then(|ext| ext.get(SIGNATURE_EXT_KEY))
            .and_then(Value::as_str)
    }
}

/// Routing category of a message, decided purely by its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Application traffic: any channel outside `/meta/`
    Publish,
    /// `/meta/subscribe` and anything below it
    Subscribe,
    /// Handshake, connect, unsubscribe and every other meta channel
    MetaOther,
}

impl MessageCategory {
    pub fn of(channel: &str) -> Self {
        if !channel.starts_with(META_PREFIX) {
            return Self::Publish;
        }

        let is_subscribe = channel
            .strip_prefix(SUBSCRIBE_CHANNEL)
            .map(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(false);

        if is_subscribe {
            Self::Subscribe
        } else {
            Self::MetaOther
        }
    }

    /// Whether messages of this category are protected content
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Publish | Self::Subscribe)
    }
}

/// Opaque credential issued by the authentication endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Payload handed to an authenticator for one attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Session key of the connection being authenticated
    pub client_id: Option<String>,
    /// Subjects of the messages currently held, in arrival order
    pub subjects: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_from_channel() {
        assert_eq!(MessageCategory::of("/foobar"), MessageCategory::Publish);
        assert_eq!(MessageCategory::of("/meta"), MessageCategory::Publish);
        assert_eq!(
            MessageCategory::of("/meta/subscribe"),
            MessageCategory::Subscribe
        );
        assert_eq!(
            MessageCategory::of("/meta/subscribe/x"),
            MessageCategory::Subscribe
        );
        assert_eq!(
            MessageCategory::of("/meta/subscribers"),
            MessageCategory::MetaOther
        );
        assert_eq!(
            MessageCategory::of("/meta/handshake"),
            MessageCategory::MetaOther
        );
        assert_eq!(
            MessageCategory::of("/meta/unsubscribe"),
            MessageCategory::MetaOther
        );
    }

    #[test]
    fn test_subject_prefers_subscription() {
        let message = Message::new("/meta/subscribe").with_subscription("/foobar");
        assert_eq!(message.subject(), "/foobar");

        let message = Message::new("/chat/room");
        assert_eq!(message.subject(), "/chat/room");
    }

    #[test]
    fn test_attach_credential_keeps_existing_ext() {
        let mut message = Message::new("/foobar");
        message.ext = Some(json!({"trace": "abc"}).as_object().cloned().unwrap());

        message.attach_credential(&Credential::new("sig-1"));

        assert_eq!(message.signature(), Some("sig-1"));
        assert_eq!(message.ext.as_ref().unwrap()["trace"], "abc");
    }

    #[test]
    fn test_wire_format_uses_bayeux_names() {
        let message: Message = serde_json::from_value(json!({
            "channel": "/meta/handshake",
            "clientId": "abc123",
            "successful": true
        }))
        .unwrap();

        assert_eq!(message.client_id.as_deref(), Some("abc123"));
        assert_eq!(message.successful, Some(true));

        let value = serde_json::to_value(Message::new("/foobar").with_client_id("c1")).unwrap();
        assert_eq!(value, json!({"channel": "/foobar", "clientId": "c1"}));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::new("secret"));
        assert!(!rendered.contains("secret"));
    }
}
