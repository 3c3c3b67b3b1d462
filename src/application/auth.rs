//! Current-user token lookup on top of an [`AuthStateSource`].

use tokio::sync::watch;
use tracing::debug;

use crate::application::repos::{AuthState, AuthStateSource};

/// Resolve the signed-in user's token.
///
/// Subscribes to auth-state changes, takes the first resolved state and drops the
/// subscription. A source that closes before resolving counts as signed out.
pub async fn current_user_token(source: &dyn AuthStateSource) -> Option<String> {
    let mut receiver = source.subscribe();
    let state = first_resolved(&mut receiver).await;
    drop(receiver);

    match state {
        AuthState::SignedIn { token } => Some(token),
        AuthState::SignedOut | AuthState::Pending => {
            debug!(target = "postdesk::auth", "no signed-in session");
            None
        }
    }
}

async fn first_resolved(receiver: &mut watch::Receiver<AuthState>) -> AuthState {
    let current = receiver.borrow_and_update().clone();
    if current != AuthState::Pending {
        return current;
    }

    match receiver.changed().await {
        Ok(()) => receiver.borrow_and_update().clone(),
        Err(_) => AuthState::SignedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ChannelSource(watch::Sender<AuthState>);

    impl AuthStateSource for ChannelSource {
        fn subscribe(&self) -> watch::Receiver<AuthState> {
            self.0.subscribe()
        }
    }

    #[tokio::test]
    async fn signed_in_state_yields_token() {
        let (sender, _keep) = watch::channel(AuthState::SignedIn {
            token: "t0k".into(),
        });
        let source = ChannelSource(sender);
        assert_eq!(current_user_token(&source).await.as_deref(), Some("t0k"));
    }

    #[tokio::test]
    async fn pending_state_waits_for_first_event() {
        let (sender, _keep) = watch::channel(AuthState::Pending);
        let source = ChannelSource(sender);

        let resolve = async {
            tokio::task::yield_now().await;
            source.0.send_replace(AuthState::SignedIn {
                token: "late".into(),
            });
        };
        let (token, ()) = tokio::join!(current_user_token(&source), resolve);

        assert_eq!(token.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn signed_out_state_yields_none() {
        let (sender, _keep) = watch::channel(AuthState::SignedOut);
        let source = ChannelSource(sender);
        assert!(current_user_token(&source).await.is_none());
    }
}
