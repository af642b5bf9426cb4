use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{GuardDecision, Redirect, RouteGuard};

/// Shortest period a re-validation task will run at.
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Background re-check of a mounted view. The task is aborted when the handle
/// is stopped or dropped, and ends by itself after delivering one redirect.
pub struct Revalidation {
    handle: JoinHandle<()>,
    redirects: mpsc::Receiver<Redirect>,
}

impl Revalidation {
    pub(super) fn spawn(guard: Arc<RouteGuard>, period: Duration) -> Self {
        let (tx, redirects) = mpsc::channel(1);
        if period < MIN_PERIOD {
            tracing::warn!("Re-validation period {:?} too short, using {:?}", period, MIN_PERIOD);
        }
        let period = period.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately; the mount already decided
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match guard.recheck().await {
                    Ok(GuardDecision::Authorized) => {}
                    Ok(GuardDecision::Redirect(redirect)) => {
                        let _ = tx.send(redirect).await;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Session re-validation failed, keeping session: {}", e);
                    }
                }
            }
        });

        Self { handle, redirects }
    }

    /// Non-blocking check for a pending redirect.
    pub fn try_next(&mut self) -> Option<Redirect> {
        self.redirects.try_recv().ok()
    }

    /// Wait for the next redirect; `None` once the task has stopped.
    pub async fn next(&mut self) -> Option<Redirect> {
        self.redirects.recv().await
    }

    pub fn stop(&mut self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Revalidation {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::testing::{guard, FakeProfile};
    use crate::session::{MemorySessionStore, Session, SessionStore};
    use crate::types::Role;

    #[tokio::test]
    async fn delivers_one_redirect_then_finishes() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = Arc::new(guard(store, FakeProfile::returning(Role::Admin)));
        let mut revalidation = guard.revalidate_every(Duration::from_millis(5));

        let redirect = tokio::time::timeout(Duration::from_secs(2), revalidation.next())
            .await
            .unwrap();

        assert!(matches!(redirect, Some(Redirect::Login(_))));
        assert_eq!(revalidation.next().await, None);
        assert!(revalidation.is_finished());
    }

    #[tokio::test]
    async fn zero_period_still_revalidates() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Admin)));
        let guard = Arc::new(guard(store.clone(), FakeProfile::returning(Role::Admin)).require_role(Role::Admin));
        let mut revalidation = guard.revalidate_every(Duration::ZERO);

        store.clear().unwrap();
        let redirect = tokio::time::timeout(Duration::from_secs(2), revalidation.next())
            .await
            .unwrap();

        assert!(matches!(redirect, Some(Redirect::Login(_))));
    }

    #[tokio::test]
    async fn stop_cancels_the_task() {
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: Some("t".into()),
            role: None,
        }));
        let profile = FakeProfile::returning(Role::Admin);
        let guard = Arc::new(guard(store.clone(), profile.clone()).require_role(Role::Admin));
        let mut revalidation = guard.revalidate_every(Duration::from_millis(5));

        revalidation.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(revalidation.is_finished());
        assert_eq!(revalidation.next().await, None);
        assert_eq!(profile.calls(), 0);
        assert_eq!(store.cached_role().unwrap(), None);
    }
}
