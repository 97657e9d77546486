use std::collections::HashMap;

use crate::config::AuthSettings;
use crate::session::UserIdentity;

/// Credential check performed on login; the session layer only records the result.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password_hash: &str) -> Option<UserIdentity>;
}

/// Username/password-digest pairs from configuration. The user id is the username.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.users.clone())
    }
}

impl Authenticator for StaticCredentials {
    fn authenticate(&self, username: &str, password_hash: &str) -> Option<UserIdentity> {
        match self.users.get(username) {
            Some(expected) if !username.is_empty() && expected == password_hash => Some(UserIdentity {
                user_id: username.to_string(),
                username: username.to_string(),
            }),
            _ => None,
        }
    }
}
