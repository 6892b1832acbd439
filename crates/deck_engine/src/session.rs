use std::sync::Arc;

use tokio::sync::watch;

/// Identity of the signed-in user. Everything the engine writes is tagged with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    /// Bearer token for row-level access; the anon key is used when absent.
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Source of the current session and of session changes.
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<Session>;
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

/// Session provider driven by explicit sign-in and sign-out calls.
#[derive(Debug)]
pub struct StaticSessionProvider {
    sender: watch::Sender<Option<Session>>,
}

impl StaticSessionProvider {
    pub fn new(initial: Option<Session>) -> Arc<Self> {
        let (sender, _) = watch::channel(initial);
        Arc::new(Self { sender })
    }

    pub fn sign_in(&self, session: Session) {
        self.sender.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        self.sender.send_replace(None);
    }
}

impl SessionProvider for StaticSessionProvider {
    fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionProvider, StaticSessionProvider};

    #[tokio::test]
    async fn sign_out_is_observed_by_subscribers() {
        let provider = StaticSessionProvider::new(Some(Session::new("u1")));
        let mut rx = provider.subscribe();
        assert_eq!(rx.borrow_and_update().clone(), Some(Session::new("u1")));

        provider.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), None);
        assert_eq!(provider.current(), None);
    }
}
