//! Authentication context handed to the orchestrator.
//!
//! The identity subsystem owns the sender half and publishes a fresh context
//! whenever the session changes. Consumers hold a receiver and read the latest
//! value at submit time, so a token refresh never requires re-wiring.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Current user session as seen by the signing queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Bearer token sent with every signing request.
    pub token: String,
    pub person_id: String,
    pub full_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AuthContext {
    pub fn new(token: impl Into<String>, person_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            person_id: person_id.into(),
            ..Default::default()
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

pub type AuthSender = watch::Sender<AuthContext>;
pub type AuthReceiver = watch::Receiver<AuthContext>;

/// Create the subscription pair used to propagate session updates.
pub fn auth_channel(initial: AuthContext) -> (AuthSender, AuthReceiver) {
    watch::channel(initial)
}
