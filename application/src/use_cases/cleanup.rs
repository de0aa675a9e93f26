//! Periodic sweep of idle sessions.

use crate::config::CleanupPolicy;
use crate::ports::user_store::{StoreError, UserStateStore};
use crate::use_cases::correlation::SessionCorrelator;
use chrono::{DateTime, TimeDelta, Utc};
use herd_domain::USER_KEY_PREFIX;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions_removed: usize,
    pub users_removed: usize,
}

pub struct CleanupSweep {
    store: Arc<dyn UserStateStore>,
    correlator: Arc<SessionCorrelator>,
    policy: CleanupPolicy,
}

impl CleanupSweep {
    pub fn new(
        store: Arc<dyn UserStateStore>,
        correlator: Arc<SessionCorrelator>,
        policy: CleanupPolicy,
    ) -> Self {
        Self {
            store,
            correlator,
            policy,
        }
    }

    /// Forget sessions idle since before `now - max_session_age`, and users
    /// left with none.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<CleanupReport, StoreError> {
        let max_age = TimeDelta::from_std(self.policy.max_session_age).unwrap_or(TimeDelta::MAX);
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return Ok(CleanupReport::default());
        };

        let mut report = CleanupReport::default();
        for (key, mut state) in self.store.list_by_prefix(USER_KEY_PREFIX).await? {
            let stale: Vec<_> = state
                .sessions
                .iter()
                .filter(|s| s.last_accessed < cutoff)
                .map(|s| (s.instance_id.clone(), s.id.clone()))
                .collect();
            if stale.is_empty() {
                continue;
            }

            report.sessions_removed += state.prune_idle(cutoff);
            for (instance_id, session_id) in &stale {
                self.correlator.forget(instance_id, session_id);
            }

            if state.is_empty() {
                self.store.delete(&key).await?;
                report.users_removed += 1;
            } else {
                self.store.set(&key, &state).await?;
            }
        }

        if report.sessions_removed > 0 {
            info!(
                "Cleanup removed {} idle sessions and {} empty users",
                report.sessions_removed, report.users_removed
            );
        }
        Ok(report)
    }

    /// Sweep every `policy.interval` until `cancellation` fires.
    pub async fn run(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.policy.interval);
        // The first tick completes immediately; sweep at startup too.
        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        warn!("Cleanup sweep failed: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::user_store::MemoryUserStore;
    use herd_domain::{InstanceId, Session, UserState};
    use std::time::Duration;

    fn app() -> InstanceId {
        InstanceId::new("auto-app").unwrap()
    }

    fn policy() -> CleanupPolicy {
        CleanupPolicy::from_hours(3600, 24)
    }

    #[tokio::test]
    async fn test_sweep_prunes_idle_sessions_and_empty_users() {
        let store = Arc::new(MemoryUserStore::new());
        let correlator = Arc::new(SessionCorrelator::new(store.clone()));
        let now = Utc::now();
        let old = now - TimeDelta::hours(48);

        let mut alice = UserState::new("alice");
        alice.add_session(Session::new("ses_old", app(), "old", old));
        alice.add_session(Session::new("ses_new", app(), "new", now));
        store.set(&alice.key(), &alice).await.unwrap();

        let mut bob = UserState::new("bob");
        bob.add_session(Session::new("ses_bob", app(), "old", old));
        store.set(&bob.key(), &bob).await.unwrap();
        correlator.remember(&app(), "ses_bob", "bob");

        let sweep = CleanupSweep::new(store.clone(), correlator.clone(), policy());
        let report = sweep.run_once(now).await.unwrap();
        assert_eq!(
            report,
            CleanupReport {
                sessions_removed: 2,
                users_removed: 1
            }
        );

        let alice = store.get("user:alice").await.unwrap().unwrap();
        assert_eq!(alice.sessions.len(), 1);
        assert_eq!(alice.current_session_id.as_deref(), Some("ses_new"));
        assert_eq!(store.get("user:bob").await.unwrap(), None);
        assert_eq!(correlator.indexed(), 0);
    }

    #[tokio::test]
    async fn test_sweep_leaves_fresh_records_untouched() {
        let store = Arc::new(MemoryUserStore::new());
        let correlator = Arc::new(SessionCorrelator::new(store.clone()));
        let mut alice = UserState::new("alice");
        alice.add_session(Session::new("ses_1", app(), "t", Utc::now()));
        store.set(&alice.key(), &alice).await.unwrap();

        let sweep = CleanupSweep::new(store.clone(), correlator, policy());
        let report = sweep.run_once(Utc::now()).await.unwrap();
        assert_eq!(report, CleanupReport::default());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let store = Arc::new(MemoryUserStore::new());
        let correlator = Arc::new(SessionCorrelator::new(store.clone()));
        let sweep = CleanupSweep::new(store, correlator, policy());
        let token = CancellationToken::new();
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), sweep.run(token))
            .await
            .unwrap();
    }
}
