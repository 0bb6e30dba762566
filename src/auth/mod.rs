//! Session token holder.
//!
//! Replayed and proxied backend requests carry a bearer token sourced from
//! the console's session. The token can be refreshed at runtime; requests
//! issued without a token simply omit the Authorization header.

use std::sync::RwLock;

/// Thread-safe holder for the current session bearer token.
#[derive(Debug, Default)]
pub struct SessionTokens {
    token: RwLock<Option<String>>,
}

impl SessionTokens {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial),
        }
    }

    /// Current bearer token, if a session is active.
    pub fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    /// Replace the token (login / refresh). `None` clears it (logout).
    pub fn set_bearer(&self, token: Option<String>) {
        if let Ok(mut t) = self.token.write() {
            *t = token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle() {
        let tokens = SessionTokens::new(None);
        assert!(tokens.bearer().is_none());

        tokens.set_bearer(Some("abc123".to_string()));
        assert_eq!(tokens.bearer().as_deref(), Some("abc123"));

        tokens.set_bearer(None);
        assert!(tokens.bearer().is_none());
    }
}
