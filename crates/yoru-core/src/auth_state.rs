//! Auth state machine
//!
//! `Idle -> Loading -> Authenticated | Idle | Error`, with `Error` returning to
//! `Authenticated` when a profile is still held and to `Idle` otherwise.
//! Logout may land in `Idle` from anywhere. The machine lives for the whole
//! process; there is no terminal state.

use crate::error::TransitionError;
use crate::types::Profile;
use serde::{Deserialize, Serialize};

/// Auth state with its associated data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No session, no error
    #[default]
    Idle,
    /// Request in flight; carries the profile held before the request
    Loading { user: Option<Profile> },
    /// Signed in
    Authenticated { user: Profile },
    /// Last request failed; a previously held profile is retained
    Error { error: String, user: Option<Profile> },
}

impl AuthState {
    /// Discriminant without data
    #[inline]
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        match self {
            Self::Idle => AuthStatus::Idle,
            Self::Loading { .. } => AuthStatus::Loading,
            Self::Authenticated { .. } => AuthStatus::Authenticated,
            Self::Error { .. } => AuthStatus::Error,
        }
    }

    /// Profile held in this state, if any
    #[inline]
    #[must_use]
    pub fn user(&self) -> Option<&Profile> {
        match self {
            Self::Idle => None,
            Self::Authenticated { user } => Some(user),
            Self::Loading { user } | Self::Error { user, .. } => user.as_ref(),
        }
    }

    /// Error message, only in `Error`
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Auth state discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Idle,
    Loading,
    Authenticated,
    Error,
}

impl AuthStatus {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
        }
    }
}

/// Validates a state transition.
pub fn validate_transition(from: AuthStatus, to: AuthStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Statuses reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: AuthStatus) -> &'static [AuthStatus] {
    use AuthStatus::*;
    match from {
        // Authenticated here is a restored session
        Idle => &[Idle, Loading, Authenticated],
        Loading => &[Authenticated, Idle, Error],
        Authenticated => &[Loading, Idle],
        Error => &[Idle, Authenticated, Loading],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::types::Tier;
    use proptest::prelude::*;

    fn profile() -> Profile {
        Profile::new(Identity::account("42"), "a@x.com", Tier::Free)
    }

    #[test]
    fn login_path_is_legal() {
        assert!(validate_transition(AuthStatus::Idle, AuthStatus::Loading).is_ok());
        assert!(validate_transition(AuthStatus::Loading, AuthStatus::Authenticated).is_ok());
        assert!(validate_transition(AuthStatus::Loading, AuthStatus::Error).is_ok());
        assert!(validate_transition(AuthStatus::Error, AuthStatus::Idle).is_ok());
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(validate_transition(AuthStatus::Idle, AuthStatus::Error).is_err());
        assert!(validate_transition(AuthStatus::Loading, AuthStatus::Loading).is_err());
        assert!(validate_transition(AuthStatus::Authenticated, AuthStatus::Error).is_err());
    }

    #[test]
    fn error_retains_user() {
        let state = AuthState::Error {
            error: "boom".into(),
            user: Some(profile()),
        };
        assert_eq!(state.status(), AuthStatus::Error);
        assert_eq!(state.error(), Some("boom"));
        assert_eq!(state.user().map(|p| p.email.as_str()), Some("a@x.com"));
    }

    #[test]
    fn idle_has_no_user() {
        assert_eq!(AuthState::default(), AuthState::Idle);
        assert!(AuthState::Idle.user().is_none());
        assert!(!AuthState::Idle.is_authenticated());
    }

    proptest! {
        #[test]
        fn prop_logout_always_reaches_idle(
            from in prop_oneof![
                Just(AuthStatus::Idle),
                Just(AuthStatus::Loading),
                Just(AuthStatus::Authenticated),
                Just(AuthStatus::Error),
            ]
        ) {
            prop_assert!(validate_transition(from, AuthStatus::Idle).is_ok());
        }
    }
}
