use async_trait::async_trait;

use randcaps_core::error::RandCapsError;

pub const ROOM_MESSAGE_EVENT_TYPE: &str = "m.room.message";
pub const TEXT_MSGTYPE: &str = "m.text";

/// How the session proves its identity to the homeserver.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Pre-issued token, injected directly without an exchange.
    AccessToken(String),
    /// Exchanged for a token through a password login.
    Password { user_id: String, password: String },
}

impl Credential {
    /// Token wins when both are configured. Blank values count as unset.
    pub fn resolve(user_id: &str, access_token: Option<&str>, password: Option<&str>) -> Option<Self> {
        let token = access_token.map(str::trim).filter(|v| !v.is_empty());
        if let Some(token) = token {
            return Some(Credential::AccessToken(token.to_string()));
        }
        let password = password.filter(|v| !v.trim().is_empty())?;
        Some(Credential::Password {
            user_id: user_id.trim().to_string(),
            password: password.to_string(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::AccessToken(_) => "access_token",
            Credential::Password { .. } => "password",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credential::Password { user_id, .. } => f
                .debug_struct("Password")
                .field("user_id", user_id)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// One inbound room event, as delivered by a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub event_id: String,
    pub room_id: String,
    pub sender: String,
    pub event_type: String,
    pub msgtype: Option<String>,
    pub body: String,
}

impl StreamEvent {
    pub fn is_text_message(&self) -> bool {
        self.event_type == ROOM_MESSAGE_EVENT_TYPE && self.msgtype.as_deref() == Some(TEXT_MSGTYPE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncBatch {
    pub next_batch: String,
    pub events: Vec<StreamEvent>,
}

#[async_trait]
pub trait MessageStream: Send + Sync {
    /// Fully-qualified id of the account this stream acts as.
    fn user_id(&self) -> &str;

    async fn authenticate(&mut self, credential: &Credential) -> Result<(), RandCapsError>;

    /// Long-poll for new events. Returns when events arrive or `timeout_ms`
    /// elapses, possibly with an empty batch.
    async fn sync(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncBatch, RandCapsError>;

    async fn send_text(&self, room_id: &str, body: &str) -> Result<(), RandCapsError>;
}
