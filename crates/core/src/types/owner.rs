//! Visitor and owner identity types.
//!
//! Designs are stored under an *owner*: either an anonymous visitor (keyed by
//! a transient token that lives as long as the browser session) or an
//! authenticated account.

use core::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::id::AccountId;

/// Transient identity of an anonymous visitor.
///
/// Each browser session gets a unique, cryptographically random token
/// (128-bit, URL-safe base64 without padding).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorToken(String);

impl VisitorToken {
    /// Generate a new random visitor token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a token issued by the session layer.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity a design record is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerId {
    /// Anonymous visitor, identified by their session token.
    Visitor(VisitorToken),
    /// Authenticated account.
    Account(AccountId),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visitor(token) => write!(f, "visitor:{token}"),
            Self::Account(id) => write!(f, "account:{id}"),
        }
    }
}

/// Current visitor context for one inbound request.
///
/// Every visitor has a session token; authenticated visitors additionally
/// carry their account id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    /// Session token (ephemeral tier key).
    pub token: VisitorToken,
    /// Account id when logged in (durable tier key).
    pub account: Option<AccountId>,
}

impl Visitor {
    /// An anonymous visitor.
    #[must_use]
    pub const fn anonymous(token: VisitorToken) -> Self {
        Self {
            token,
            account: None,
        }
    }

    /// An authenticated visitor.
    #[must_use]
    pub const fn authenticated(token: VisitorToken, account: AccountId) -> Self {
        Self {
            token,
            account: Some(account),
        }
    }

    /// Whether the visitor is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.account.is_some()
    }

    /// The owner identity new records are attributed to.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.account.map_or_else(
            || OwnerId::Visitor(self.token.clone()),
            OwnerId::Account,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = VisitorToken::generate();
        let b = VisitorToken::generate();
        assert_ne!(a, b);
        // 16 bytes, base64 without padding
        assert_eq!(a.as_str().len(), 22);
    }

    #[test]
    fn test_owner_prefers_account() {
        let token = VisitorToken::new("tok");
        let anon = Visitor::anonymous(token.clone());
        assert_eq!(anon.owner(), OwnerId::Visitor(token.clone()));

        let authed = Visitor::authenticated(token, AccountId::new(9));
        assert!(authed.is_authenticated());
        assert_eq!(authed.owner(), OwnerId::Account(AccountId::new(9)));
    }

    #[test]
    fn test_owner_display() {
        assert_eq!(OwnerId::Account(AccountId::new(3)).to_string(), "account:3");
        assert_eq!(
            OwnerId::Visitor(VisitorToken::new("abc")).to_string(),
            "visitor:abc"
        );
    }

    #[test]
    fn test_owner_serde_shape() {
        let json = serde_json::to_value(OwnerId::Account(AccountId::new(5))).expect("serialize");
        assert_eq!(json, serde_json::json!({"kind": "account", "id": 5}));
    }
}
