//! Session source backed by a watch channel.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::repos::{AuthState, AuthStateSource};

/// The operator session of this deployment.
///
/// Seeded from configuration; `sign_in` and `sign_out` publish changes to every
/// subscriber. Signing in only ever restores the configured token.
#[derive(Debug)]
pub struct OperatorSession {
    configured: Option<String>,
    state: watch::Sender<AuthState>,
}

impl OperatorSession {
    pub fn from_token(token: Option<String>) -> Self {
        let initial = match &token {
            Some(token) => AuthState::SignedIn {
                token: token.clone(),
            },
            None => AuthState::SignedOut,
        };
        let (state, _) = watch::channel(initial);
        Self {
            configured: token,
            state,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::SignedIn { .. })
    }

    /// Returns `false` when no operator token is configured.
    pub fn sign_in(&self) -> bool {
        let Some(token) = self.configured.clone() else {
            warn!(
                target = "postdesk::auth",
                "sign-in requested without a configured operator token"
            );
            return false;
        };
        self.state.send_replace(AuthState::SignedIn { token });
        info!(target = "postdesk::auth", "operator signed in");
        true
    }

    pub fn sign_out(&self) {
        self.state.send_replace(AuthState::SignedOut);
        info!(target = "postdesk::auth", "operator signed out");
    }
}

impl AuthStateSource for OperatorSession {
    fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::auth::current_user_token;

    #[tokio::test]
    async fn configured_token_survives_sign_out_and_back_in() {
        let session = OperatorSession::from_token(Some("tok".into()));
        assert!(session.is_signed_in());
        assert_eq!(current_user_token(&session).await.as_deref(), Some("tok"));

        session.sign_out();
        assert!(!session.is_signed_in());
        assert!(current_user_token(&session).await.is_none());

        assert!(session.sign_in());
        assert_eq!(current_user_token(&session).await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn missing_token_cannot_sign_in() {
        let session = OperatorSession::from_token(None);
        assert!(current_user_token(&session).await.is_none());

        assert!(!session.sign_in());
        assert!(!session.is_signed_in());
        assert!(current_user_token(&session).await.is_none());
    }
}
