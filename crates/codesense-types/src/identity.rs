//! Caller identity as seen by the session layer.
//!
//! The identity provider itself is an external collaborator; the client only
//! needs to know whether a signed-in user is present and, if so, their id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated { user_id: String },
}

impl Identity {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Identity::Authenticated {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { user_id } => Some(user_id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    /// Whether this identity may read or modify a session owned by `owner`.
    ///
    /// Anonymous sessions (`owner == None`) are open to everyone.
    pub fn can_access(&self, owner: Option<&str>) -> bool {
        match owner {
            None => true,
            Some(owner) => self.user_id() == Some(owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_anonymous() {
        assert!(Identity::default().is_anonymous());
        assert_eq!(Identity::default().user_id(), None);
    }

    #[test]
    fn test_can_access() {
        let alice = Identity::authenticated("alice");
        assert!(alice.can_access(Some("alice")));
        assert!(!alice.can_access(Some("bob")));
        assert!(alice.can_access(None));
        assert!(!Identity::Anonymous.can_access(Some("alice")));
        assert!(Identity::Anonymous.can_access(None));
    }
}
