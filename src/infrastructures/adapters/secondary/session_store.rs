use crate::domain::external_apis::session::SessionToken;
use crate::domain::models::session::{Session, SessionUser};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Process-local session table. Sessions vanish on restart.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, access_token: String, user: SessionUser) -> SessionToken {
        let token = Uuid::new_v4().simple().to_string();
        let session = Session {
            access_token,
            user,
            expires_at: Utc::now() + self.ttl,
        };
        self.lock().insert(token.clone(), session);
        SessionToken(token)
    }

    /// The session for `token`; expired sessions are evicted on lookup.
    pub fn get(&self, token: &SessionToken) -> Option<Session> {
        let mut sessions = self.lock();
        let session = sessions.get(&token.0)?;
        if session.is_expired_at(Utc::now()) {
            tracing::debug!(login = %session.user.login, "Session expired");
            sessions.remove(&token.0);
            return None;
        }
        Some(session.clone())
    }

    pub fn remove(&self, token: &SessionToken) -> Option<Session> {
        self.lock().remove(&token.0)
    }

    /// Evicts every expired session. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            login: "octocat".to_string(),
            name: None,
        }
    }

    #[test]
    fn created_session_is_found_until_removed() {
        let store = InMemorySessionStore::new(Duration::hours(1));
        let token = store.create("gho_abc".to_string(), user());

        let session = store.get(&token).unwrap();
        assert_eq!(session.access_token, "gho_abc");
        assert_eq!(session.user.login, "octocat");

        assert!(store.remove(&token).is_some());
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn expired_session_is_evicted() {
        let store = InMemorySessionStore::new(Duration::seconds(-1));
        let token = store.create("gho_abc".to_string(), user());

        assert!(store.get(&token).is_none());
        assert!(store.remove(&token).is_none());
    }

    #[test]
    fn sweep_evicts_sessions_nobody_asks_for_again() {
        let expired = InMemorySessionStore::new(Duration::seconds(-1));
        expired.create("a".to_string(), user());
        expired.create("b".to_string(), user());
        assert_eq!(expired.sweep_expired(), 2);
        assert_eq!(expired.sweep_expired(), 0);

        let live = InMemorySessionStore::new(Duration::hours(1));
        let token = live.create("c".to_string(), user());
        assert_eq!(live.sweep_expired(), 0);
        assert!(live.get(&token).is_some());
    }

    #[test]
    fn tokens_are_unique() {
        let store = InMemorySessionStore::new(Duration::hours(1));
        let a = store.create("a".to_string(), user());
        let b = store.create("b".to_string(), user());
        assert_ne!(a, b);
    }
}
