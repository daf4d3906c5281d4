//! Current-identity tracking.
//!
//! # Invariants
//! - Starts unresolved with no identity.
//! - Once resolved, never returns to unresolved.

use crate::model::identity::Identity;

/// Resolution state of the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unresolved,
    Resolved(Option<Identity>),
}

/// What an identity event means for the document mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityTransition {
    /// First resolution after start.
    Initial,
    /// Subject changed (sign-in, sign-out or account switch).
    Changed,
    /// Same subject re-delivered; profile fields may have been refreshed.
    Unchanged,
}

impl IdentityTransition {
    pub fn requires_resubscribe(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone)]
pub struct SessionTracker {
    state: SessionState,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unresolved,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True until the provider delivers its first resolution.
    pub fn is_resolving(&self) -> bool {
        matches!(self.state, SessionState::Unresolved)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Unresolved => None,
            SessionState::Resolved(identity) => identity.as_ref(),
        }
    }

    /// Records the identity reported by the provider.
    pub fn apply(&mut self, identity: Option<Identity>) -> IdentityTransition {
        let transition = match &self.state {
            SessionState::Unresolved => IdentityTransition::Initial,
            SessionState::Resolved(previous) => {
                let same = match (previous, &identity) {
                    (None, None) => true,
                    (Some(previous), Some(next)) => previous.same_subject(next),
                    _ => false,
                };
                if same {
                    IdentityTransition::Unchanged
                } else {
                    IdentityTransition::Changed
                }
            }
        };
        self.state = SessionState::Resolved(identity);
        transition
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
