//! Session lifecycle: boot, sign-in, token refresh, sign-out.
//!
//! The [`SessionManager`] is the only writer of the token store and the
//! only component that talks to the auth endpoints. Everything else
//! asks it for the current status, the current user, or an access
//! token, and routes authenticated calls through [`SessionManager::authorized`]
//! so the refresh-on-401-and-retry-once policy exists in exactly one
//! place.
//!
//! A session is [`SessionStatus::Initializing`] until [`SessionManager::initialize`]
//! resolves it to `Authenticated` or `Anonymous`. Resolution is
//! permanent for the life of the process; network failures leave the
//! session unresolved and retryable instead.

mod error;
mod store;

pub use error::SessionError;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, keys};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use tamarind_core::{Email, Jwt, TokenPair, User, UserUpdate};

use crate::api::{ApiClient, ApiError, AuthPayload};

const SESSION_EXPIRED: &str = "your session has expired, please sign in again";

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Boot has not resolved yet, or the last attempt failed to reach
    /// the server.
    Initializing,
    /// A user is signed in.
    Authenticated,
    /// Nobody is signed in.
    Anonymous,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Authenticated => "authenticated",
            Self::Anonymous => "anonymous",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug)]
struct SessionState {
    status: SessionStatus,
    user: Option<User>,
    access: Option<Jwt>,
    refresh: Option<Jwt>,
}

impl SessionState {
    const fn new() -> Self {
        Self {
            status: SessionStatus::Initializing,
            user: None,
            access: None,
            refresh: None,
        }
    }
}

/// Owner of the session lifecycle.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    state: Mutex<SessionState>,
    init_flight: tokio::sync::Mutex<()>,
    refresh_flight: tokio::sync::Mutex<()>,
    /// Bumped whenever a refresh attempt reaches a verdict (new tokens
    /// committed, or the session cleared). Callers that waited out a
    /// concurrent refresh compare generations to adopt that verdict
    /// instead of firing a second refresh.
    refresh_generation: AtomicU64,
    cancel: CancellationToken,
}

impl SessionManager {
    /// Create a manager over an API client and a token store.
    #[must_use]
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                api,
                store,
                state: Mutex::new(SessionState::new()),
                init_flight: tokio::sync::Mutex::new(()),
                refresh_flight: tokio::sync::Mutex::new(()),
                refresh_generation: AtomicU64::new(0),
                cancel: CancellationToken::new(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Boot
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve the session from stored tokens.
    ///
    /// With no usable stored access token this resolves `Anonymous`
    /// without touching the network. Otherwise it looks up the account
    /// behind the token; if the token is rejected it refreshes once and
    /// retries the lookup once.
    ///
    /// `Ok` means the session is resolved and stays resolved; later
    /// calls return the resolved status without re-running boot.
    ///
    /// # Errors
    ///
    /// An error means the session is still unresolved: stored tokens
    /// are untouched and another call may retry. This happens when the
    /// server is unreachable or answers with something other than a
    /// verdict on the tokens.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<SessionStatus, SessionError> {
        let _flight = self.guard(self.inner.init_flight.lock()).await?;

        let current = self.status();
        if current != SessionStatus::Initializing {
            return Ok(current);
        }
        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::ShutDown);
        }

        let Some(access) = self.stored_access_token() else {
            info!("no stored session, starting anonymous");
            self.resolve_anonymous();
            return Ok(SessionStatus::Anonymous);
        };

        {
            let mut state = self.lock_state();
            state.access = Some(access.clone());
            state.refresh = self.stored_refresh_token();
        }

        match self.guard(self.inner.api.fetch_current_user(&access)).await? {
            Ok(user) => {
                self.commit_user(user)?;
                info!("session restored");
                Ok(SessionStatus::Authenticated)
            }
            Err(err) if err.is_unauthorized() => {
                debug!("stored access token rejected, attempting refresh");
                self.recover_with_refresh().await
            }
            Err(err) if err.is_network() => {
                warn!("could not reach the server to restore the session");
                Err(err.into())
            }
            Err(err) => {
                warn!(error = %err, "identity lookup failed, leaving session unresolved");
                Err(err.into())
            }
        }
    }

    /// Continue boot after the stored access token was rejected: one
    /// refresh, then one more identity lookup with the fresh token.
    async fn recover_with_refresh(&self) -> Result<SessionStatus, SessionError> {
        match self.refresh().await {
            Ok(()) => {}
            Err(err) if err.is_network() => return Err(err),
            Err(SessionError::ShutDown) => return Err(SessionError::ShutDown),
            Err(err) => {
                // refresh() already cleared the session.
                debug!(error = %err, "refresh rejected, starting anonymous");
                return Ok(SessionStatus::Anonymous);
            }
        }

        // A concurrent sign-out can empty the session between the
        // refresh and here.
        let Some(access) = self.access_token() else {
            self.clear_to_anonymous();
            return Ok(SessionStatus::Anonymous);
        };

        match self.guard(self.inner.api.fetch_current_user(&access)).await? {
            Ok(user) => {
                self.commit_user(user)?;
                info!("session restored after refresh");
                Ok(SessionStatus::Authenticated)
            }
            Err(err) if err.is_unauthorized() => {
                warn!("freshly issued token rejected, starting anonymous");
                self.clear_to_anonymous();
                Ok(SessionStatus::Anonymous)
            }
            Err(err) => {
                warn!(error = %err, "identity lookup failed after refresh, leaving session unresolved");
                Err(err.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sign-in
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed, the server refuses
    /// the credentials, or the server is unreachable. The session is
    /// left exactly as it was.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let email = Email::parse(email)?;
        let payload = self
            .guard(self.inner.api.login(email.as_str(), password))
            .await??;
        let user = self.commit_auth(payload)?;
        info!(user = %user.id, "signed in");
        Ok(user)
    }

    /// Create an account and sign in with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is malformed, the server refuses
    /// the registration, or the server is unreachable. The session is
    /// left exactly as it was.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        let email = Email::parse(email)?;
        let payload = self
            .guard(self.inner.api.register(name, email.as_str(), password))
            .await??;
        let user = self.commit_auth(payload)?;
        info!(user = %user.id, "account created");
        Ok(user)
    }

    /// Sign in by exchanging a Google ID token.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses the token or is
    /// unreachable. The session is left exactly as it was.
    #[instrument(skip(self, id_token))]
    pub async fn login_with_google(&self, id_token: &str) -> Result<User, SessionError> {
        let payload = self
            .guard(self.inner.api.login_with_google(id_token))
            .await??;
        let user = self.commit_auth(payload)?;
        info!(user = %user.id, "signed in with google");
        Ok(user)
    }

    /// Store a fresh auth payload. Tokens are validated before anything
    /// is written, so a bad payload leaves both the store and the
    /// session untouched.
    fn commit_auth(&self, payload: AuthPayload) -> Result<User, SessionError> {
        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::ShutDown);
        }

        let pair = TokenPair::parse(&payload.tokens.access_token, &payload.tokens.refresh_token)
            .map_err(|err| {
                warn!(error = %err, "sign-in returned unusable tokens");
                malformed_payload()
            })?;

        self.inner
            .store
            .store_pair(pair.access.as_str(), pair.refresh.as_str());

        let mut state = self.lock_state();
        state.status = SessionStatus::Authenticated;
        state.user = Some(payload.user.clone());
        state.access = Some(pair.access);
        state.refresh = Some(pair.refresh);

        Ok(payload.user)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange the refresh token for a fresh pair.
    ///
    /// Concurrent calls collapse into one network exchange: whoever
    /// arrives while a refresh is in flight waits for it and adopts its
    /// verdict.
    ///
    /// # Errors
    ///
    /// A network error leaves the session exactly as it was. Any other
    /// failure means the refresh token is no longer good, so the whole
    /// session is cleared and the status becomes `Anonymous`.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let generation = self.inner.refresh_generation.load(Ordering::Acquire);
        let _flight = self.guard(self.inner.refresh_flight.lock()).await?;

        if self.inner.refresh_generation.load(Ordering::Acquire) != generation {
            return if self.status() == SessionStatus::Anonymous {
                Err(SessionError::Rejected(SESSION_EXPIRED.to_owned()))
            } else {
                Ok(())
            };
        }

        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), SessionError> {
        let Some(refresh) = self.current_refresh_token() else {
            warn!("no refresh token available, signing out");
            self.fail_refresh();
            return Err(SessionError::Rejected(SESSION_EXPIRED.to_owned()));
        };

        let payload = match self.guard(self.inner.api.refresh(&refresh)).await? {
            Ok(payload) => payload,
            Err(err) if err.is_network() => {
                debug!("refresh did not reach the server, keeping current session");
                return Err(err.into());
            }
            Err(err) => {
                warn!(error = %err, "refresh rejected, signing out");
                self.fail_refresh();
                return Err(err.into());
            }
        };

        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::ShutDown);
        }

        let pair = TokenPair::parse(&payload.tokens.access_token, &payload.tokens.refresh_token)
            .map_err(|err| {
                warn!(error = %err, "refresh returned unusable tokens, signing out");
                self.fail_refresh();
                malformed_payload()
            })?;

        self.inner
            .store
            .store_pair(pair.access.as_str(), pair.refresh.as_str());
        {
            let mut state = self.lock_state();
            state.access = Some(pair.access);
            state.refresh = Some(pair.refresh);
        }
        self.inner.refresh_generation.fetch_add(1, Ordering::AcqRel);
        debug!("token pair refreshed");
        Ok(())
    }

    /// Terminal refresh failure: the stored session can never
    /// authenticate again, so drop it everywhere.
    fn fail_refresh(&self) {
        self.inner.store.clear_session();
        self.resolve_anonymous();
        self.inner.refresh_generation.fetch_add(1, Ordering::AcqRel);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sign-out and profile
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign out. Synchronous, touches no network, always succeeds.
    pub fn logout(&self) {
        self.inner.store.clear_session();
        self.resolve_anonymous();
        info!("signed out");
    }

    /// Apply a partial profile update to the signed-in user. Ignored
    /// for anonymous sessions and for empty updates.
    pub fn update_user(&self, update: UserUpdate) {
        if update.is_empty() {
            return;
        }
        let mut state = self.lock_state();
        match state.user.as_mut() {
            Some(user) => user.merge(update),
            None => debug!("ignoring profile update for anonymous session"),
        }
    }

    /// Abort in-flight session work. Operations that were awaiting the
    /// network return [`SessionError::ShutDown`] without committing
    /// anything.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authenticated calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Run an API call with the current access token. If the server
    /// rejects the token, refresh once and retry the call once.
    ///
    /// # Errors
    ///
    /// Fails fast with `ApiError::Unauthorized` when nobody is signed
    /// in. Otherwise returns whatever the call (or its single retry)
    /// returned; a failed refresh surfaces as `Unauthorized` so callers
    /// can prompt for sign-in.
    #[instrument(skip(self, call))]
    pub async fn authorized<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: AsyncFn(Jwt) -> Result<T, ApiError>,
    {
        let Some(access) = self.access_token() else {
            return Err(ApiError::Unauthorized("not signed in".to_owned()));
        };

        match call(access.clone()).await {
            Err(err) if err.is_unauthorized() => {
                // Skip the refresh when another caller already rotated
                // the pair while this call was in flight; the retry
                // below picks up the newer token either way.
                if self.access_token().as_ref() == Some(&access) {
                    debug!("access token rejected, refreshing and retrying once");
                    if let Err(refresh_err) = self.refresh().await {
                        return Err(match refresh_err {
                            SessionError::Network(detail) => ApiError::Network(detail),
                            other => ApiError::Unauthorized(other.to_string()),
                        });
                    }
                }

                let Some(access) = self.access_token() else {
                    return Err(ApiError::Unauthorized("not signed in".to_owned()));
                };
                call(access).await
            }
            result => result,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Current session status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.lock_state().user.clone()
    }

    /// True when a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// The current access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<Jwt> {
        self.lock_state().access.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Await `operation` unless the manager shuts down first.
    async fn guard<T>(&self, operation: impl Future<Output = T>) -> Result<T, SessionError> {
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(SessionError::ShutDown),
            value = operation => Ok(value),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the session authenticated once the identity behind the
    /// already-seeded tokens is known.
    fn commit_user(&self, user: User) -> Result<(), SessionError> {
        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::ShutDown);
        }
        let mut state = self.lock_state();
        state.status = SessionStatus::Authenticated;
        state.user = Some(user);
        Ok(())
    }

    /// Resolve the in-memory session to anonymous. Stored tokens are
    /// not touched; clearing them is a separate decision.
    fn resolve_anonymous(&self) {
        let mut state = self.lock_state();
        state.status = SessionStatus::Anonymous;
        state.user = None;
        state.access = None;
        state.refresh = None;
    }

    fn clear_to_anonymous(&self) {
        self.inner.store.clear_session();
        self.resolve_anonymous();
    }

    fn stored_access_token(&self) -> Option<Jwt> {
        let raw = self.inner.store.access_token()?;
        match Jwt::parse(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                debug!(error = %err, "stored access token is not a usable token");
                None
            }
        }
    }

    fn stored_refresh_token(&self) -> Option<Jwt> {
        let raw = self.inner.store.refresh_token()?;
        match Jwt::parse(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                debug!(error = %err, "stored refresh token is not a usable token");
                None
            }
        }
    }

    fn current_refresh_token(&self) -> Option<Jwt> {
        let from_state = self.lock_state().refresh.clone();
        from_state.or_else(|| self.stored_refresh_token())
    }
}

fn malformed_payload() -> SessionError {
    SessionError::Rejected("the server returned an unexpected response".to_owned())
}
