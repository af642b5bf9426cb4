//! Route guard for protected dashboard views.
//!
//! Authentication is a presence check on the stored token. Authorization reads
//! the cached role first and only falls back to the profile endpoint when the
//! cache is empty. A failed profile fetch denies access but never clears the
//! token, so a network blip cannot log anyone out.

pub mod revalidate;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::client::{ApiClientError, HandoffExchange, ProfileSource};
use crate::handoff::{bootstrap_from_url, take_handoff_code, Bootstrap};
use crate::session::SessionStore;
use crate::types::Role;

pub use revalidate::Revalidation;

/// Where a guard sends the browser instead of rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Cross-application redirect to the external login page.
    Login(Url),
    /// In-app route shown when the role does not match.
    Unauthorized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Authorized,
    Redirect(Redirect),
}

/// Per-mount lifecycle. `Loading` is only ever left, never re-entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Redirecting(Redirect),
    Authorized,
}

pub struct RouteGuard {
    store: Arc<dyn SessionStore>,
    profile: Arc<dyn ProfileSource>,
    exchange: Option<Arc<dyn HandoffExchange>>,
    required_role: Option<Role>,
    login_url: Url,
    unauthorized_path: String,
}

impl RouteGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        profile: Arc<dyn ProfileSource>,
        login_url: Url,
        unauthorized_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            profile,
            exchange: None,
            required_role: None,
            login_url,
            unauthorized_path: unauthorized_path.into(),
        }
    }

    /// Require a specific role on top of authentication.
    pub fn require_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    /// Redeem `?code=` handoffs on mount through `exchange`.
    pub fn with_handoff_exchange(mut self, exchange: Arc<dyn HandoffExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    fn login(&self) -> GuardDecision {
        GuardDecision::Redirect(Redirect::Login(self.login_url.clone()))
    }

    fn unauthorized(&self) -> GuardDecision {
        GuardDecision::Redirect(Redirect::Unauthorized(self.unauthorized_path.clone()))
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.token() {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Unable to read session store: {}", e);
                None
            }
        }
    }

    /// Resolve the caller's role: cache first, then one profile round trip
    /// whose answer repopulates the cache.
    async fn resolve_role(&self, token: &str) -> Result<Role, ApiClientError> {
        match self.store.cached_role() {
            Ok(Some(role)) => return Ok(role),
            Ok(None) => {}
            Err(e) => tracing::warn!("Unable to read cached role: {}", e),
        }

        let role = self.profile.fetch_role(token).await?;
        if let Err(e) = self.store.cache_role(role) {
            tracing::warn!("Unable to cache role {}: {}", role, e);
        }
        Ok(role)
    }

    async fn check(&self) -> Result<GuardDecision, ApiClientError> {
        let Some(token) = self.stored_token() else {
            return Ok(self.login());
        };

        let Some(required) = self.required_role else {
            return Ok(GuardDecision::Authorized);
        };

        let role = self.resolve_role(&token).await?;
        if role == required {
            Ok(GuardDecision::Authorized)
        } else {
            tracing::info!("Role {} does not satisfy required role {}", role, required);
            Ok(self.unauthorized())
        }
    }

    /// Initial mount decision. Profile failures resolve to "not authorized".
    pub async fn evaluate(&self) -> GuardDecision {
        match self.check().await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("Profile check failed, denying access: {}", e);
                self.unauthorized()
            }
        }
    }

    /// Periodic re-check. The role is refetched rather than read from the
    /// cache; when the fetch fails the cached role still decides, and the
    /// failure is surfaced to the caller instead of turning into a redirect.
    pub async fn recheck(&self) -> Result<GuardDecision, ApiClientError> {
        let Some(token) = self.stored_token() else {
            return Ok(self.login());
        };

        let Some(required) = self.required_role else {
            return Ok(GuardDecision::Authorized);
        };

        let role = match self.profile.fetch_role(&token).await {
            Ok(role) => {
                if let Err(e) = self.store.cache_role(role) {
                    tracing::warn!("Unable to refresh cached role {}: {}", role, e);
                }
                role
            }
            Err(e) => match self.store.cached_role() {
                Ok(Some(cached)) if cached != required => cached,
                _ => return Err(e),
            },
        };

        if role == required {
            Ok(GuardDecision::Authorized)
        } else {
            tracing::info!("Role changed to {}, no longer satisfies {}", role, required);
            Ok(self.unauthorized())
        }
    }

    /// Import whatever handoff `location` carries: a one-time code redeemed
    /// through the exchange, or a plain token/role parcel. Both are stripped.
    pub async fn import_handoff(&self, location: &mut Url) {
        if let Some(code) = take_handoff_code(location) {
            match &self.exchange {
                Some(exchange) => match exchange.redeem(&code).await {
                    Ok(parcel) => {
                        let role = parcel.role;
                        match self.store.set(parcel.into()) {
                            Ok(()) => tracing::debug!("Redeemed handoff code for {}", role),
                            Err(e) => tracing::error!("Unable to store handoff session: {}", e),
                        }
                    }
                    Err(e) => tracing::warn!("Handoff code rejected: {}", e),
                },
                None => tracing::warn!("Handoff code ignored, no exchange configured"),
            }
        }

        match bootstrap_from_url(location, self.store()) {
            Ok(Bootstrap::Imported(parcel)) => {
                tracing::debug!("Mounted with handoff parcel for {}", parcel.role)
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Handoff bootstrap failed: {}", e),
        }
    }

    /// Start a cancellable re-validation task bound to the returned handle.
    pub fn revalidate_every(self: Arc<Self>, period: Duration) -> Revalidation {
        Revalidation::spawn(self, period)
    }
}

/// A guarded view: children are only reachable while the guard says so.
pub struct ProtectedView<T> {
    guard: Arc<RouteGuard>,
    children: T,
    state: GuardState,
    period: Duration,
    revalidation: Option<Revalidation>,
}

impl<T> ProtectedView<T> {
    pub fn new(guard: Arc<RouteGuard>, children: T, period: Duration) -> Self {
        Self {
            guard,
            children,
            state: GuardState::Loading,
            period,
            revalidation: None,
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Import any handoff code or parcel from `location`, decide, and start periodic
    /// re-validation when authorized. Later calls return the settled state.
    pub async fn mount(&mut self, location: Option<&mut Url>) -> &GuardState {
        if self.state != GuardState::Loading {
            return &self.state;
        }

        if let Some(url) = location {
            self.guard.import_handoff(url).await;
        }

        self.state = match self.guard.evaluate().await {
            GuardDecision::Authorized => {
                self.revalidation = Some(self.guard.clone().revalidate_every(self.period));
                GuardState::Authorized
            }
            GuardDecision::Redirect(redirect) => GuardState::Redirecting(redirect),
        };
        &self.state
    }

    /// Apply any redirect produced by re-validation since the last call.
    pub fn poll(&mut self) -> &GuardState {
        if let Some(redirect) = self.revalidation.as_mut().and_then(|r| r.try_next()) {
            self.leave(redirect);
        }
        &self.state
    }

    /// Wait until re-validation forces this view away.
    pub async fn redirected(&mut self) -> &GuardState {
        if let Some(revalidation) = self.revalidation.as_mut() {
            if let Some(redirect) = revalidation.next().await {
                self.leave(redirect);
            }
        }
        &self.state
    }

    fn leave(&mut self, redirect: Redirect) {
        tracing::info!("Re-validation redirecting to {:?}", redirect);
        self.state = GuardState::Redirecting(redirect);
        if let Some(mut revalidation) = self.revalidation.take() {
            revalidation.stop();
        }
    }

    pub fn render(&self) -> Option<&T> {
        match self.state {
            GuardState::Authorized => Some(&self.children),
            _ => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::handoff::HandoffParcel;
    use crate::session::{MemorySessionStore, Session};

    const PERIOD: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn handoff_url_mounts_admin_view_without_network() {
        let store = Arc::new(MemorySessionStore::new());
        let profile = FakeProfile::returning(Role::Client);
        let guard = Arc::new(guard(store.clone(), profile.clone()).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, "dashboard", PERIOD);
        let mut location = Url::parse("https://admin.example.com/dashboard?token=abc123&role=Admin").unwrap();

        let state = view.mount(Some(&mut location)).await.clone();

        assert_eq!(state, GuardState::Authorized);
        assert_eq!(store.get().unwrap(), Session::new("abc123", Role::Admin));
        assert_eq!(location.query(), None);
        assert_eq!(view.render(), Some(&"dashboard"));
        assert_eq!(profile.calls(), 0);
    }

    #[tokio::test]
    async fn empty_store_redirects_to_external_login() {
        let store = Arc::new(MemorySessionStore::new());
        let profile = FakeProfile::returning(Role::Admin);
        let guard = Arc::new(guard(store, profile.clone()).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, "dashboard", PERIOD);

        let state = view.mount(None).await.clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Login(login_url())));
        assert_eq!(view.render(), None);
        assert_eq!(profile.calls(), 0);
    }

    #[tokio::test]
    async fn cached_role_short_circuits_profile_fetch() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Admin)));
        let profile = FakeProfile::failing();
        let guard = guard(store, profile.clone()).require_role(Role::Admin);

        assert_eq!(guard.evaluate().await, GuardDecision::Authorized);
        assert_eq!(profile.calls(), 0);
    }

    #[tokio::test]
    async fn missing_role_fetches_profile_once_and_caches_it() {
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: Some("t".into()),
            role: None,
        }));
        let profile = FakeProfile::returning(Role::Admin);
        let guard = guard(store.clone(), profile.clone()).require_role(Role::Admin);

        assert_eq!(guard.evaluate().await, GuardDecision::Authorized);
        assert_eq!(guard.evaluate().await, GuardDecision::Authorized);

        assert_eq!(profile.calls(), 1);
        assert_eq!(store.cached_role().unwrap(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn wrong_role_goes_to_unauthorized_route() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Client)));
        let guard = guard(store, FakeProfile::returning(Role::Client)).require_role(Role::Admin);

        assert_eq!(
            guard.evaluate().await,
            GuardDecision::Redirect(Redirect::Unauthorized("/unauthorized".into()))
        );
    }

    #[tokio::test]
    async fn profile_failure_denies_but_keeps_token() {
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: Some("t".into()),
            role: None,
        }));
        let profile = FakeProfile::failing();
        let guard = Arc::new(guard(store.clone(), profile.clone()).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, (), PERIOD);

        let state = view.mount(None).await.clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Unauthorized("/unauthorized".into())));
        assert_eq!(view.render(), None);
        assert_eq!(store.token().unwrap().as_deref(), Some("t"));
        assert_eq!(profile.calls(), 1);
    }

    #[tokio::test]
    async fn guard_without_role_requirement_only_checks_token() {
        let store = Arc::new(MemorySessionStore::with_session(Session {
            token: Some("t".into()),
            role: None,
        }));
        let profile = FakeProfile::failing();
        let guard = guard(store, profile.clone());

        assert_eq!(guard.evaluate().await, GuardDecision::Authorized);
        assert_eq!(profile.calls(), 0);
    }

    #[tokio::test]
    async fn mount_settles_once() {
        let store = Arc::new(MemorySessionStore::new());
        let guard = Arc::new(guard(store.clone(), FakeProfile::returning(Role::Admin)));
        let mut view = ProtectedView::new(guard, (), PERIOD);

        view.mount(None).await;
        store.set(Session::new("late", Role::Admin)).unwrap();
        let state = view.mount(None).await.clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Login(login_url())));
    }

    #[tokio::test]
    async fn revalidation_redirects_after_logout_elsewhere() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Admin)));
        let guard = Arc::new(guard(store.clone(), FakeProfile::returning(Role::Admin)).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, (), Duration::from_millis(10));
        assert_eq!(view.mount(None).await, &GuardState::Authorized);

        store.clear().unwrap();
        let state = tokio::time::timeout(Duration::from_secs(2), view.redirected())
            .await
            .expect("re-validation should redirect")
            .clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Login(login_url())));
        assert_eq!(view.render(), None);
    }

    #[tokio::test]
    async fn revalidation_ignores_transient_profile_errors() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Admin)));
        let profile = FakeProfile::failing();
        let guard = Arc::new(guard(store.clone(), profile.clone()).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, (), Duration::from_millis(10));
        assert_eq!(view.mount(None).await, &GuardState::Authorized);

        // Drop the cached role so each tick has to hit the failing profile endpoint
        store
            .set(Session {
                token: Some("t".into()),
                role: None,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(view.poll(), &GuardState::Authorized);
        assert_eq!(store.token().unwrap().as_deref(), Some("t"));
        assert!(profile.calls() >= 1);
    }

    #[tokio::test]
    async fn handoff_code_is_redeemed_and_stripped_on_mount() {
        let store = Arc::new(MemorySessionStore::new());
        let profile = FakeProfile::returning(Role::Client);
        let exchange = FakeExchange::accepting(
            "xyz",
            HandoffParcel {
                token: "abc123".into(),
                role: Role::Admin,
            },
        );
        let guard = guard(store.clone(), profile.clone())
            .require_role(Role::Admin)
            .with_handoff_exchange(exchange);
        let mut view = ProtectedView::new(Arc::new(guard), (), PERIOD);
        let mut location = Url::parse("https://admin.example.com/dashboard?code=xyz&tab=2").unwrap();

        let state = view.mount(Some(&mut location)).await.clone();

        assert_eq!(state, GuardState::Authorized);
        assert_eq!(location.as_str(), "https://admin.example.com/dashboard?tab=2");
        assert_eq!(store.get().unwrap(), Session::new("abc123", Role::Admin));
        assert_eq!(profile.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_handoff_code_is_stripped_and_falls_back_to_login() {
        let store = Arc::new(MemorySessionStore::new());
        let exchange = FakeExchange::accepting(
            "other",
            HandoffParcel {
                token: "abc123".into(),
                role: Role::Admin,
            },
        );
        let guard = guard(store.clone(), FakeProfile::returning(Role::Admin)).with_handoff_exchange(exchange);
        let mut view = ProtectedView::new(Arc::new(guard), (), PERIOD);
        let mut location = Url::parse("https://admin.example.com/dashboard?code=xyz").unwrap();

        let state = view.mount(Some(&mut location)).await.clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Login(login_url())));
        assert_eq!(location.query(), None);
        assert_eq!(store.get().unwrap(), Session::default());
    }

    #[tokio::test]
    async fn revalidation_refreshes_a_stale_cached_role() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Admin)));
        let profile = FakeProfile::returning(Role::Client);
        let guard = Arc::new(guard(store.clone(), profile.clone()).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, (), Duration::from_millis(10));

        // The mount trusts the cache
        assert_eq!(view.mount(None).await, &GuardState::Authorized);
        assert_eq!(profile.calls(), 0);

        let state = tokio::time::timeout(Duration::from_secs(2), view.redirected())
            .await
            .expect("re-validation should notice the role change")
            .clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Unauthorized("/unauthorized".into())));
        assert_eq!(store.cached_role().unwrap(), Some(Role::Client));
        assert_eq!(store.token().unwrap().as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn zero_period_view_still_redirects_after_logout() {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("t", Role::Admin)));
        let guard = Arc::new(guard(store.clone(), FakeProfile::returning(Role::Admin)).require_role(Role::Admin));
        let mut view = ProtectedView::new(guard, (), Duration::ZERO);
        assert_eq!(view.mount(None).await, &GuardState::Authorized);

        store.clear().unwrap();
        let state = tokio::time::timeout(Duration::from_secs(2), view.redirected())
            .await
            .expect("re-validation should still run")
            .clone();

        assert_eq!(state, GuardState::Redirecting(Redirect::Login(login_url())));
    }
}
