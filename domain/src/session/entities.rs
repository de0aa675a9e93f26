//! Session domain entities

use crate::core::error::DomainError;
use crate::instance::entities::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key prefix under which user records are persisted.
pub const USER_KEY_PREFIX: &str = "user:";

/// A conversation context created on one instance (Entity)
///
/// Belongs to exactly one instance. The instance id was valid when the
/// session was created but may go stale if that instance is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub instance_id: InstanceId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        instance_id: InstanceId,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            instance_id,
            title: title.into(),
            created_at: now,
            last_accessed: now,
        }
    }

    /// True when this record is the `(session, instance)` pair an event names.
    pub fn matches(&self, session_id: &str, instance_id: &InstanceId) -> bool {
        self.id == session_id && &self.instance_id == instance_id
    }
}

/// Per-user bookkeeping of sessions and the current selection (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub user_id: String,
    #[serde(default)]
    pub current_session_id: Option<String>,
    #[serde(default)]
    pub current_instance_id: Option<InstanceId>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl UserState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_session_id: None,
            current_instance_id: None,
            sessions: Vec::new(),
        }
    }

    /// Storage key of a user's record.
    pub fn storage_key(user_id: &str) -> String {
        format!("{USER_KEY_PREFIX}{user_id}")
    }

    pub fn key(&self) -> String {
        Self::storage_key(&self.user_id)
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current_session_id
            .as_deref()
            .and_then(|id| self.session(id))
    }

    /// Whether this user owns `session_id` on `instance_id`.
    pub fn owns(&self, session_id: &str, instance_id: &InstanceId) -> bool {
        self.sessions
            .iter()
            .any(|s| s.matches(session_id, instance_id))
    }

    /// Record a session and make it current.
    ///
    /// A record with the same id on the same instance is replaced.
    pub fn add_session(&mut self, session: Session) {
        self.sessions
            .retain(|s| !s.matches(&session.id, &session.instance_id));
        self.current_session_id = Some(session.id.clone());
        self.current_instance_id = Some(session.instance_id.clone());
        self.sessions.push(session);
    }

    /// Make an owned session current.
    pub fn switch_to(&mut self, session_id: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| DomainError::UnknownSession(session_id.to_string()))?;
        session.last_accessed = now;
        self.current_instance_id = Some(session.instance_id.clone());
        self.current_session_id = Some(session.id.clone());
        Ok(())
    }

    /// Drop a session record, clearing the selection if it was current.
    pub fn remove_session(&mut self, session_id: &str) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == session_id)?;
        let removed = self.sessions.remove(index);
        if self.current_session_id.as_deref() == Some(session_id) {
            self.current_session_id = None;
        }
        Some(removed)
    }

    /// Update `last_accessed`; returns false if the session is not owned.
    pub fn touch(&mut self, session_id: &str, now: DateTime<Utc>) -> bool {
        match self.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.last_accessed = now;
                true
            }
            None => false,
        }
    }

    /// Restore the selection invariants after a load.
    ///
    /// A current session that no longer exists is cleared; a current
    /// instance that disagrees with the current session is realigned.
    /// Returns true when anything changed.
    pub fn repair(&mut self) -> bool {
        let Some(current_id) = self.current_session_id.clone() else {
            return false;
        };
        match self.session(&current_id).map(|s| s.instance_id.clone()) {
            None => {
                self.current_session_id = None;
                true
            }
            Some(instance_id) if self.current_instance_id.as_ref() != Some(&instance_id) => {
                self.current_instance_id = Some(instance_id);
                true
            }
            Some(_) => false,
        }
    }

    /// Drop sessions not accessed since `cutoff`; returns how many were removed.
    pub fn prune_idle(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.last_accessed >= cutoff);
        let removed = before - self.sessions.len();
        if removed > 0 {
            self.repair();
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn instance(id: &str) -> InstanceId {
        InstanceId::new(id).unwrap()
    }

    fn session(id: &str, inst: &str) -> Session {
        Session::new(id, instance(inst), "chat", Utc::now())
    }

    #[test]
    fn add_session_makes_it_current() {
        let mut state = UserState::new("42");
        state.add_session(session("ses_a", "main"));
        assert_eq!(state.current_session_id.as_deref(), Some("ses_a"));
        assert_eq!(state.current_instance_id, Some(instance("main")));
        assert_eq!(state.key(), "user:42");
    }

    #[test]
    fn owns_requires_matching_instance() {
        let mut state = UserState::new("42");
        state.add_session(session("ses_a", "main"));
        assert!(state.owns("ses_a", &instance("main")));
        assert!(!state.owns("ses_a", &instance("auto-other")));
    }

    #[test]
    fn switch_to_unknown_session_fails() {
        let mut state = UserState::new("42");
        let err = state.switch_to("missing", Utc::now()).unwrap_err();
        assert!(err.is_unknown_session());
    }

    #[test]
    fn switch_to_realigns_instance() {
        let mut state = UserState::new("42");
        state.add_session(session("ses_a", "main"));
        state.add_session(session("ses_b", "auto-api"));
        state.switch_to("ses_a", Utc::now()).unwrap();
        assert_eq!(state.current_instance_id, Some(instance("main")));
    }

    #[test]
    fn repair_clears_dangling_current_session() {
        let mut state = UserState::new("42");
        state.current_session_id = Some("gone".to_string());
        assert!(state.repair());
        assert!(state.current_session_id.is_none());
    }

    #[test]
    fn repair_realigns_current_instance() {
        let mut state = UserState::new("42");
        state.add_session(session("ses_a", "main"));
        state.current_instance_id = Some(instance("auto-stale"));
        assert!(state.repair());
        assert_eq!(state.current_instance_id, Some(instance("main")));
        assert!(!state.repair());
    }

    #[test]
    fn remove_current_session_clears_selection() {
        let mut state = UserState::new("42");
        state.add_session(session("ses_a", "main"));
        assert!(state.remove_session("ses_a").is_some());
        assert!(state.current_session_id.is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn prune_idle_drops_old_sessions() {
        let now = Utc::now();
        let mut state = UserState::new("42");
        let mut old = session("ses_old", "main");
        old.last_accessed = now - Duration::days(30);
        state.add_session(old);
        state.add_session(session("ses_new", "main"));
        state.switch_to("ses_old", now - Duration::days(30)).unwrap();

        let removed = state.prune_idle(now - Duration::days(7));
        assert_eq!(removed, 1);
        assert!(state.session("ses_new").is_some());
        assert!(state.current_session_id.is_none());
    }

    #[test]
    fn legacy_record_without_optional_fields_deserializes() {
        let json = r#"{"userId":"7"}"#;
        let state: UserState = serde_json::from_str(json).unwrap();
        assert_eq!(state.user_id, "7");
        assert!(state.sessions.is_empty());
    }
}
