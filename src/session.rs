//! Explicitly passed context: the record store handle plus the
//! authenticated user supplied by the (external) session service.

use std::sync::Arc;

use crate::errors::BoardError;
use crate::store::RecordStore;

/// The authenticated user, if any. Produced by whatever owns sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<String>,
}

impl Session {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build from an optional id; blank ids count as signed out.
    pub fn from_user(user_id: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Precondition for create/delete operations.
    pub fn require_user(&self) -> Result<&str, BoardError> {
        self.user_id().ok_or(BoardError::NotAuthenticated)
    }
}

/// Handle injected into the mutator and board list.
#[derive(Clone)]
pub struct BoardContext {
    pub store: Arc<dyn RecordStore>,
    pub session: Session,
}

impl BoardContext {
    pub fn new(store: Arc<dyn RecordStore>, session: Session) -> Self {
        Self { store, session }
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session_fails_precondition() {
        let err = Session::anonymous().require_user().unwrap_err();
        assert!(matches!(err, BoardError::NotAuthenticated));
    }

    #[test]
    fn test_blank_user_is_anonymous() {
        assert_eq!(Session::from_user(Some("  ".into())), Session::anonymous());
        assert_eq!(
            Session::from_user(Some("ada".into())).require_user().unwrap(),
            "ada"
        );
    }
}
