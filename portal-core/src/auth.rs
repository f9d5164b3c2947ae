//! src/auth.rs
//! ============================================================================
//! # Authentication client seam, token refresh and the login flow
//!
//! The portal never speaks an auth protocol itself. It calls an external
//! endpoint through [`AuthClient`], retries token refresh a bounded number of
//! times, and takes the fatal path (clear the session, go to login) when the
//! refresh cannot be recovered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::{Config, RefreshConfig};
use crate::error::{PortalError, PortalResult};
use crate::http::HttpError;
use crate::model::Profile;
use crate::routing::Router;
use crate::session::SessionContext;
use crate::tasks::scope::TaskScope;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Calls to the external authentication endpoint.
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Profile, HttpError>;

    async fn logout(&self) -> Result<(), HttpError>;

    async fn profile(&self) -> Result<Profile, HttpError>;

    /// Returns the new token lifetime in seconds.
    async fn refresh_token(&self) -> Result<u64, HttpError>;

    async fn forgot_password(&self, email: &str) -> Result<(), HttpError>;

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<(), HttpError>;

    async fn recover_password(&self, email: &str, otp: &str, password: &str) -> Result<(), HttpError>;
}

/// Bounded retry for token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(300),
        }
    }
}

impl From<&RefreshConfig> for RetryPolicy {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.delay,
        }
    }
}

/// Refresh the token, retrying transient failures with a fixed delay. A 401
/// fails at once.
pub async fn refresh_with_retry(client: &dyn AuthClient, policy: RetryPolicy) -> PortalResult<u64> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match client.refresh_token().await {
            Ok(expiry) => {
                info!(
                    marker = "TOKEN_REFRESHED",
                    operation_type = "token_refresh",
                    attempt,
                    expiry_secs = expiry,
                    "Token refreshed"
                );
                return Ok(expiry);
            }
            Err(err) if err.status == 401 => {
                warn!(
                    marker = "TOKEN_REJECTED",
                    operation_type = "token_refresh",
                    attempt,
                    "Refresh token rejected"
                );
                return Err(PortalError::session_expired("refresh token rejected"));
            }
            Err(err) if attempt >= max_attempts => {
                warn!(
                    marker = "TOKEN_REFRESH_EXHAUSTED",
                    operation_type = "token_refresh",
                    attempt,
                    status = err.status,
                    "Token refresh retries exhausted"
                );
                return Err(PortalError::session_expired(format!(
                    "refresh failed after {attempt} attempts (last status {})",
                    err.status
                )));
            }
            Err(err) => {
                warn!(
                    marker = "TOKEN_REFRESH_RETRY",
                    operation_type = "token_refresh",
                    attempt,
                    status = err.status,
                    "Token refresh failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

struct GuardInner {
    client: Arc<dyn AuthClient>,
    session: Arc<SessionContext>,
    router: Arc<dyn Router>,
    policy: RetryPolicy,
    margin: Duration,
    login_route: String,
}

impl GuardInner {
    async fn expire(&self, reason: &PortalError) {
        warn!(
            marker = "SESSION_EXPIRED",
            operation_type = "session_guard",
            reason = %reason,
            "Session expired, returning to login"
        );
        if let Err(e) = self.session.logout().await {
            warn!(
                marker = "SESSION_CLEAR_FAILED",
                operation_type = "session_guard",
                error = %e,
                "Could not clear persisted session"
            );
        }
        self.router.replace(&self.login_route);
    }

    async fn refresh_now(&self) -> PortalResult<u64> {
        match refresh_with_retry(self.client.as_ref(), self.policy).await {
            Ok(expiry) => {
                if let Err(e) = self.session.reload().await {
                    warn!(
                        marker = "SESSION_RELOAD_FAILED",
                        operation_type = "session_guard",
                        error = %e,
                        "Persisted profile unreadable after refresh"
                    );
                }
                Ok(expiry)
            }
            Err(err) => {
                self.expire(&err).await;
                Err(err)
            }
        }
    }

    fn wait_for(&self, expiry_secs: u64) -> Duration {
        Duration::from_secs(expiry_secs).saturating_sub(self.margin)
    }
}

/// Keeps the session alive for a signed-in user.
///
/// At most one refresh loop runs at a time. Logging out stops the loop but
/// leaves the guard usable for the next sign-in; only `teardown` retires it.
pub struct SessionGuard {
    inner: Arc<GuardInner>,
    scope: TaskScope,
    refresh_loop: Mutex<Option<CancellationToken>>,
}

impl SessionGuard {
    pub fn new(
        client: Arc<dyn AuthClient>,
        session: Arc<SessionContext>,
        router: Arc<dyn Router>,
        config: &RefreshConfig,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                client,
                session,
                router,
                policy: RetryPolicy::from(config),
                margin: config.margin,
                login_route: login_route.into(),
            }),
            scope: TaskScope::new("session-guard"),
            refresh_loop: Mutex::new(None),
        }
    }

    /// Guard using the `refresh` settings and the login route of `config`.
    pub fn from_config(
        client: Arc<dyn AuthClient>,
        session: Arc<SessionContext>,
        router: Arc<dyn Router>,
        config: &Config,
    ) -> Self {
        Self::new(client, session, router, &config.refresh, config.routes.login.clone())
    }

    fn ensure_live(&self) -> PortalResult<()> {
        if self.scope.is_torn_down() {
            Err(PortalError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.inner.session
    }

    /// Load the profile, persist it and start the refresh timer. An
    /// unauthorized profile call falls back to one refresh cycle.
    pub async fn boot(&self) -> PortalResult<()> {
        self.ensure_live()?;
        let profile = match self.inner.client.profile().await {
            Ok(profile) => profile,
            Err(err) if err.status == 401 => {
                let expiry = self.inner.refresh_now().await?;
                self.schedule_refresh(expiry);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let expiry = profile.token_remaining_expiry_seconds;
        self.inner.session.update(profile).await?;
        if let Some(expiry) = expiry {
            self.schedule_refresh(expiry);
        }
        Ok(())
    }

    /// Refresh immediately. Failure takes the session-expiry path.
    pub async fn refresh_now(&self) -> PortalResult<u64> {
        self.ensure_live()?;
        self.inner.refresh_now().await
    }

    /// Start the background refresh loop: wait until `margin` before expiry,
    /// refresh, repeat. Stops after the first unrecoverable failure. A loop
    /// already running is cancelled first.
    pub fn schedule_refresh(&self, expiry_secs: u64) {
        if expiry_secs == 0 {
            self.stop_refresh();
            return;
        }
        let token = self.scope.cancellation_token();
        if let Some(previous) = self.refresh_loop.lock().replace(token.clone()) {
            previous.cancel();
        }

        let inner = self.inner.clone();
        let span = info_span!("token_refresh_loop", expiry_secs);

        self.scope.spawn(
            async move {
                let refreshing = async {
                    let mut expiry = expiry_secs;
                    loop {
                        tokio::time::sleep(inner.wait_for(expiry)).await;
                        match inner.refresh_now().await {
                            Ok(next) if next > 0 => expiry = next,
                            _ => break,
                        }
                    }
                };
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        debug!(
                            marker = "REFRESH_LOOP_REPLACED",
                            operation_type = "session_guard",
                            "Refresh loop stopped"
                        );
                    }
                    () = refreshing => {}
                }
            }
            .instrument(span),
        );
    }

    /// Stop the running refresh loop, if any.
    pub fn stop_refresh(&self) {
        if let Some(token) = self.refresh_loop.lock().take() {
            token.cancel();
        }
    }

    /// Sign out remotely, then clear the session regardless of the outcome.
    pub async fn logout(&self) -> PortalResult<()> {
        if let Err(err) = self.inner.client.logout().await {
            warn!(
                marker = "LOGOUT_REMOTE_FAILED",
                operation_type = "session_guard",
                status = err.status,
                "Remote logout failed"
            );
        }
        self.stop_refresh();
        self.inner.session.logout().await?;
        self.inner.router.replace(&self.inner.login_route);
        Ok(())
    }

    pub async fn teardown(&self) {
        self.scope.teardown().await;
    }
}

/// Screens of the sign-in page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginStep {
    #[default]
    Login,
    ForgotPassword,
    GetOtp,
    ChangePassword,
    Successful,
}

/// Sign-in and password recovery state machine.
pub struct LoginFlow {
    client: Arc<dyn AuthClient>,
    step: LoginStep,
    pub credentials: Credentials,
    pub email: String,
    pub otp: String,
    pub username_error: Option<String>,
    pub password_error: Option<String>,
    pub general_error: Option<String>,
    redirect: String,
}

impl LoginFlow {
    pub fn new(client: Arc<dyn AuthClient>, redirect: impl Into<String>) -> Self {
        Self {
            client,
            step: LoginStep::Login,
            credentials: Credentials::default(),
            email: String::new(),
            otp: String::new(),
            username_error: None,
            password_error: None,
            general_error: None,
            redirect: redirect.into(),
        }
    }

    /// Flow that lands on the configured dashboard after sign-in.
    pub fn from_config(client: Arc<dyn AuthClient>, config: &Config) -> Self {
        Self::new(client, config.routes.dashboard.clone())
    }

    pub const fn step(&self) -> LoginStep {
        self.step
    }

    fn clear_errors(&mut self) {
        self.username_error = None;
        self.password_error = None;
        self.general_error = None;
    }

    fn absorb(&mut self, err: &HttpError) {
        let fields = err.field_errors();
        self.username_error = fields.get("username").cloned();
        self.password_error = fields.get("password").cloned();
        let general = err.general_errors().join(", ");
        self.general_error = (!general.is_empty()).then_some(general);
    }

    /// Sign in, persist the profile, and return where to go next.
    pub async fn login(&mut self, session: &SessionContext) -> PortalResult<String> {
        self.clear_errors();
        match self.client.login(&self.credentials).await {
            Ok(profile) => {
                session.update(profile).await?;
                info!(marker = "LOGIN_SUCCEEDED", operation_type = "login", "Signed in");
                Ok(self.redirect.clone())
            }
            Err(err) => {
                if err.status == 400 {
                    self.absorb(&err);
                }
                Err(err.into())
            }
        }
    }

    pub fn forgot_password(&mut self) {
        self.clear_errors();
        self.step = LoginStep::ForgotPassword;
    }

    pub fn back_to_login(&mut self) {
        self.clear_errors();
        self.otp.clear();
        self.step = LoginStep::Login;
    }

    fn expect_step(&self, expected: LoginStep) -> PortalResult<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(PortalError::invalid_input(
                "step",
                format!("expected {expected:?}, currently {:?}", self.step),
            ))
        }
    }

    pub async fn submit_email(&mut self, email: &str) -> PortalResult<()> {
        self.expect_step(LoginStep::ForgotPassword)?;
        self.clear_errors();
        let result = self.client.forgot_password(email).await;
        if let Err(err) = result {
            self.absorb(&err);
            return Err(err.into());
        }
        self.email = email.to_string();
        self.step = LoginStep::GetOtp;
        Ok(())
    }

    pub async fn submit_otp(&mut self, otp: &str) -> PortalResult<()> {
        self.expect_step(LoginStep::GetOtp)?;
        self.clear_errors();
        let result = self.client.verify_otp(&self.email, otp).await;
        if let Err(err) = result {
            self.absorb(&err);
            return Err(err.into());
        }
        self.otp = otp.to_string();
        self.step = LoginStep::ChangePassword;
        Ok(())
    }

    pub async fn submit_new_password(&mut self, password: &str, confirm: &str) -> PortalResult<()> {
        self.expect_step(LoginStep::ChangePassword)?;
        self.clear_errors();
        if password != confirm {
            self.password_error = Some("Passwords do not match".to_string());
            return Err(PortalError::invalid_input("confirmPassword", "passwords do not match"));
        }
        let result = self
            .client
            .recover_password(&self.email, &self.otp, password)
            .await;
        if let Err(err) = result {
            self.absorb(&err);
            return Err(err.into());
        }
        self.step = LoginStep::Successful;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::HistoryRouter;
    use crate::session::{MemorySessionStore, SessionStore};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FakeAuth {
        refreshes: Mutex<VecDeque<Result<u64, HttpError>>>,
        refresh_calls: AtomicU32,
        profile: Mutex<Option<Result<Profile, HttpError>>>,
        login: Mutex<Option<Result<Profile, HttpError>>>,
    }

    impl FakeAuth {
        fn refreshing(results: Vec<Result<u64, HttpError>>) -> Self {
            Self {
                refreshes: Mutex::new(results.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl AuthClient for FakeAuth {
        async fn login(&self, _credentials: &Credentials) -> Result<Profile, HttpError> {
            self.login.lock().take().unwrap_or_else(|| Ok(Profile::default()))
        }

        async fn logout(&self) -> Result<(), HttpError> {
            Ok(())
        }

        async fn profile(&self) -> Result<Profile, HttpError> {
            self.profile.lock().clone().unwrap_or_else(|| Ok(Profile::default()))
        }

        async fn refresh_token(&self) -> Result<u64, HttpError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refreshes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::new(500, json!(null))))
        }

        async fn forgot_password(&self, email: &str) -> Result<(), HttpError> {
            if email.contains('@') {
                Ok(())
            } else {
                Err(HttpError::new(400, json!({ "errors": { "email": "Invalid email" } })))
            }
        }

        async fn verify_otp(&self, _email: &str, otp: &str) -> Result<(), HttpError> {
            if otp == "123456" {
                Ok(())
            } else {
                Err(HttpError::new(400, json!({ "generalErrors": ["Wrong code"] })))
            }
        }

        async fn recover_password(&self, _email: &str, _otp: &str, _password: &str) -> Result<(), HttpError> {
            Ok(())
        }
    }

    fn server_error() -> Result<u64, HttpError> {
        Err(HttpError::new(500, json!(null)))
    }

    fn config() -> RefreshConfig {
        RefreshConfig {
            max_attempts: 5,
            delay: Duration::from_millis(300),
            margin: Duration::from_secs(30),
        }
    }

    async fn guard(auth: Arc<FakeAuth>) -> (SessionGuard, Arc<HistoryRouter>, Arc<dyn SessionStore>) {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        let session = Arc::new(SessionContext::hydrate(store.clone()).await.unwrap());
        let router = Arc::new(HistoryRouter::new("/dashboard"));
        let guard = SessionGuard::new(auth, session, router.clone(), &config(), "/login");
        (guard, router, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_succeeds_after_transient_failures() {
        let auth = FakeAuth::refreshing(vec![server_error(), server_error(), Ok(900)]);
        let started = tokio::time::Instant::now();

        let expiry = refresh_with_retry(&auth, RetryPolicy::default()).await.unwrap();

        assert_eq!(expiry, 900);
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_resolves_on_fifth_attempt() {
        let mut script: Vec<_> = (0..4).map(|_| server_error()).collect();
        script.push(Ok(120));
        let auth = FakeAuth::refreshing(script);

        assert_eq!(refresh_with_retry(&auth, RetryPolicy::default()).await.unwrap(), 120);
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_unauthorized_is_not_retried() {
        let auth = FakeAuth::refreshing(vec![Err(HttpError::new(401, json!(null))), Ok(1)]);
        assert!(refresh_with_retry(&auth, RetryPolicy::default()).await.is_err());
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_gives_up_after_five_attempts() {
        let auth = FakeAuth::refreshing(Vec::new());
        let err = refresh_with_retry(&auth, RetryPolicy::default()).await.unwrap_err();

        assert!(matches!(err, PortalError::SessionExpired(_)));
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_stops_on_unauthorized() {
        let auth = FakeAuth::refreshing(vec![server_error(), Err(HttpError::new(401, json!(null))), Ok(1)]);
        let err = refresh_with_retry(&auth, RetryPolicy::default()).await.unwrap_err();

        assert!(matches!(err, PortalError::SessionExpired(_)));
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_persists_profile_and_refreshes_before_expiry() {
        let auth = Arc::new(FakeAuth::refreshing(vec![Ok(0)]));
        *auth.profile.lock() = Some(Ok(Profile {
            user_name: Some("admin".into()),
            token_remaining_expiry_seconds: Some(60),
            ..Profile::default()
        }));
        let (guard, router, store) = guard(auth.clone()).await;

        guard.boot().await.unwrap();
        assert!(store.read(crate::session::PROFILE_KEY).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(router.current().as_deref(), Some("/dashboard"));
        guard.teardown().await;
    }

    fn profile_expiring_in(secs: u64) -> Option<Result<Profile, HttpError>> {
        Some(Ok(Profile {
            user_name: Some("admin".into()),
            token_remaining_expiry_seconds: Some(secs),
            ..Profile::default()
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_resumes_after_logout_and_new_boot() {
        let auth = Arc::new(FakeAuth::refreshing(vec![Ok(0), Ok(0)]));
        *auth.profile.lock() = profile_expiring_in(60);
        let (guard, router, _) = guard(auth.clone()).await;

        guard.boot().await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);

        guard.logout().await.unwrap();
        assert_eq!(router.current().as_deref(), Some("/login"));

        guard.boot().await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 2);
        guard.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_boot_replaces_running_loop() {
        let auth = Arc::new(FakeAuth::refreshing(vec![Ok(0)]));
        *auth.profile.lock() = profile_expiring_in(60);
        let (guard, _, _) = guard(auth.clone()).await;

        guard.boot().await.unwrap();
        guard.boot().await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 1);
        guard.teardown().await;
    }

    #[tokio::test]
    async fn test_torn_down_guard_reports_cancelled() {
        let (guard, _, _) = guard(Arc::new(FakeAuth::default())).await;
        guard.teardown().await;

        assert!(matches!(guard.boot().await, Err(PortalError::Cancelled)));
        assert!(matches!(guard.refresh_now().await, Err(PortalError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_expires_session() {
        let auth = Arc::new(FakeAuth::refreshing(vec![Err(HttpError::new(401, json!(null)))]));
        let (guard, router, store) = guard(auth).await;
        guard.session().update(Profile::default()).await.unwrap();

        assert!(guard.refresh_now().await.is_err());
        assert!(!guard.session().is_authenticated());
        assert_eq!(store.read(crate::session::PROFILE_KEY).await.unwrap(), None);
        assert_eq!(router.current().as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn test_login_validation_errors() {
        let auth = Arc::new(FakeAuth::default());
        *auth.login.lock() = Some(Err(HttpError::new(
            400,
            json!({ "errors": { "username": "Unknown user", "password": "Required" } }),
        )));
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        let session = SessionContext::hydrate(store).await.unwrap();
        let mut flow = LoginFlow::new(auth, "/dashboard");

        assert!(flow.login(&session).await.is_err());
        assert_eq!(flow.username_error.as_deref(), Some("Unknown user"));
        assert_eq!(flow.password_error.as_deref(), Some("Required"));

        assert_eq!(flow.login(&session).await.unwrap(), "/dashboard");
        assert!(flow.username_error.is_none());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_password_recovery_flow() {
        let mut flow = LoginFlow::new(Arc::new(FakeAuth::default()), "/dashboard");
        assert!(flow.submit_email("a@b.c").await.is_err());

        flow.forgot_password();
        assert!(flow.submit_email("nope").await.is_err());
        assert_eq!(flow.step(), LoginStep::ForgotPassword);

        flow.submit_email("ops@example.com").await.unwrap();
        assert_eq!(flow.step(), LoginStep::GetOtp);

        assert!(flow.submit_otp("000000").await.is_err());
        assert_eq!(flow.general_error.as_deref(), Some("Wrong code"));
        flow.submit_otp("123456").await.unwrap();
        assert_eq!(flow.step(), LoginStep::ChangePassword);

        assert!(flow.submit_new_password("secret1", "secret2").await.is_err());
        flow.submit_new_password("secret1", "secret1").await.unwrap();
        assert_eq!(flow.step(), LoginStep::Successful);

        flow.back_to_login();
        assert_eq!(flow.step(), LoginStep::Login);
    }
}
