//! User session bookkeeping
//!
//! Creates, selects and forgets a user's sessions, keeping the persisted
//! [`UserState`] and the correlation index in step. Reads apply the lazy
//! selection repair and persist it.

use crate::ports::backend::{BackendClient, BackendError};
use crate::ports::user_store::{StoreError, UserStateStore};
use crate::registry::InstanceRegistry;
use crate::use_cases::correlation::SessionCorrelator;
use chrono::Utc;
use herd_domain::{DomainError, InstanceId, Session, UserState};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UserSessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// The session's instance was torn down after the session was created.
    #[error("Instance {0} is no longer available")]
    InstanceUnavailable(InstanceId),

    #[error("No session selected")]
    NoCurrentSession,
}

pub struct UserSessionService {
    store: Arc<dyn UserStateStore>,
    registry: Arc<InstanceRegistry>,
    correlator: Arc<SessionCorrelator>,
}

impl UserSessionService {
    pub fn new(
        store: Arc<dyn UserStateStore>,
        registry: Arc<InstanceRegistry>,
        correlator: Arc<SessionCorrelator>,
    ) -> Self {
        Self {
            store,
            registry,
            correlator,
        }
    }

    /// Load a user's state, creating an empty one on first use.
    pub async fn get_state(&self, user_id: &str) -> Result<UserState, UserSessionError> {
        let key = UserState::storage_key(user_id);
        let Some(mut state) = self.store.get(&key).await? else {
            return Ok(UserState::new(user_id));
        };
        if state.repair() {
            debug!("Repaired session selection for {}", user_id);
            self.store.set(&key, &state).await?;
        }
        Ok(state)
    }

    /// Create a backend session on `instance_id` and make it current.
    pub async fn open_session(
        &self,
        user_id: &str,
        instance_id: &InstanceId,
        title: Option<&str>,
    ) -> Result<Session, UserSessionError> {
        let client = self
            .registry
            .client(instance_id)
            .ok_or_else(|| UserSessionError::UnknownInstance(instance_id.clone()))?;
        let created = client.create_session(title).await?;

        let session = Session::new(created.id, instance_id.clone(), created.title, Utc::now());
        let mut state = self.get_state(user_id).await?;
        state.add_session(session.clone());
        self.store.set(&state.key(), &state).await?;
        self.correlator.remember(instance_id, &session.id, user_id);

        info!(
            "Opened session {} on {} for {}",
            session.id, instance_id, user_id
        );
        Ok(session)
    }

    pub async fn switch_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Session, UserSessionError> {
        let mut state = self.get_state(user_id).await?;
        state.switch_to(session_id, Utc::now())?;
        self.store.set(&state.key(), &state).await?;
        state
            .current_session()
            .cloned()
            .ok_or(UserSessionError::NoCurrentSession)
    }

    /// Drop a session from the user's records.
    ///
    /// With `delete_remote`, the backend session is deleted too when its
    /// instance is still registered; a session the backend no longer knows
    /// is not an error.
    pub async fn forget_session(
        &self,
        user_id: &str,
        session_id: &str,
        delete_remote: bool,
    ) -> Result<Option<Session>, UserSessionError> {
        let mut state = self.get_state(user_id).await?;
        let Some(session) = state.remove_session(session_id) else {
            return Ok(None);
        };

        if delete_remote
            && let Some(client) = self.registry.client(&session.instance_id)
        {
            match client.delete_session(session_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.store.set(&state.key(), &state).await?;
        self.correlator.forget(&session.instance_id, session_id);
        Ok(Some(session))
    }

    /// Bump `last_accessed`. Concurrent touches may lose updates.
    pub async fn touch(&self, user_id: &str, session_id: &str) -> Result<bool, UserSessionError> {
        let mut state = self.get_state(user_id).await?;
        if !state.touch(session_id, Utc::now()) {
            return Ok(false);
        }
        self.store.set(&state.key(), &state).await?;
        Ok(true)
    }

    /// The current session and a client for its instance.
    pub async fn current(
        &self,
        user_id: &str,
    ) -> Result<(Session, Arc<dyn BackendClient>), UserSessionError> {
        let state = self.get_state(user_id).await?;
        let session = state
            .current_session()
            .cloned()
            .ok_or(UserSessionError::NoCurrentSession)?;
        let client = self
            .registry
            .client(&session.instance_id)
            .ok_or_else(|| UserSessionError::InstanceUnavailable(session.instance_id.clone()))?;
        Ok((session, client))
    }

    /// Send a prompt to the user's current session. The reply arrives on
    /// the instance's event stream.
    pub async fn send_prompt(&self, user_id: &str, text: &str) -> Result<Session, UserSessionError> {
        let (session, client) = self.current(user_id).await?;
        client.send_prompt(&session.id, text).await?;
        if let Err(e) = self.touch(user_id, &session.id).await {
            warn!("Failed to update last access for {}: {}", session.id, e);
        }
        Ok(session)
    }

    /// Ask the backend to stop work in the current session.
    pub async fn abort(&self, user_id: &str) -> Result<Session, UserSessionError> {
        let (session, client) = self.current(user_id).await?;
        client.abort(&session.id).await?;
        Ok(session)
    }
}
