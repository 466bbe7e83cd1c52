//! Authentication state for one shelter service session.
//!
//! The service manages session credentials through an HttpOnly cookie, so
//! the only way to learn whether a session is live is to probe a protected
//! endpoint. [AuthSession] caches the probe result and guards against
//! concurrent duplicate probes.

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::client::ClientTrait;
use crate::error::ApiError;
use crate::types::Credentials;

/// Authentication state of the current session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AuthStatus {
    /// No probe has run yet.
    #[default]
    Unknown,
    /// A probe is in flight.
    Checking,
    Authenticated,
    Unauthenticated {
        /// Present when the last transition was caused by a failure other
        /// than a plain 401.
        error: Option<String>,
    },
}

/// Tracks authentication state for one client.
///
/// A probe already in flight must not spawn a second concurrent probe:
/// `check`, `login` and `logout` serialize on an async mutex held for the
/// duration of the remote call, so concurrent callers observe the in-flight
/// result instead of issuing duplicate requests. [AuthSession::status]
/// reads the state without waiting and can observe [AuthStatus::Checking].
#[derive(Debug)]
pub struct AuthSession<C> {
    client: C,
    state: Mutex<AuthStatus>,
    transition: tokio::sync::Mutex<()>,
}

impl<C: ClientTrait> AuthSession<C> {
    pub fn new(client: C) -> Self {
        AuthSession {
            client,
            state: Mutex::new(AuthStatus::Unknown),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// The current state, without triggering a probe.
    pub fn status(&self) -> AuthStatus {
        self.state.lock().expect("auth state mutex poisoned").clone()
    }

    fn set(&self, status: AuthStatus) {
        *self.state.lock().expect("auth state mutex poisoned") = status;
    }

    /// Probe the service and cache the result.
    ///
    /// Once the state is decided, further calls return it without another
    /// network call; `login` and `logout` are the only other transitions.
    pub async fn check(&self) -> AuthStatus {
        let _guard = self.transition.lock().await;

        match self.status() {
            decided @ (AuthStatus::Authenticated | AuthStatus::Unauthenticated { .. }) => {
                return decided;
            },
            AuthStatus::Unknown | AuthStatus::Checking => {},
        }

        self.set(AuthStatus::Checking);
        let next = match self.client.probe().await {
            Ok(()) => AuthStatus::Authenticated,
            Err(ApiError::AuthRequired) => {
                // Expected during unauthenticated browsing.
                debug!("probe returned 401, session not authenticated");
                AuthStatus::Unauthenticated { error: None }
            },
            Err(err) => {
                warn!(%err, "auth probe failed");
                AuthStatus::Unauthenticated {
                    error: Some(err.to_string()),
                }
            },
        };
        self.set(next.clone());
        next
    }

    /// Log in, transitioning to [AuthStatus::Authenticated] on success.
    ///
    /// Returns the session cookie value if the service issued one, so the
    /// caller can persist it for later processes.
    pub async fn login(&self, credentials: &Credentials) -> Result<Option<String>, ApiError> {
        let _guard = self.transition.lock().await;
        match self.client.login(credentials).await {
            Ok(cookie) => {
                self.set(AuthStatus::Authenticated);
                Ok(cookie)
            },
            Err(err) => {
                self.set(AuthStatus::Unauthenticated {
                    error: Some(err.to_string()),
                });
                Err(err)
            },
        }
    }

    /// Log out. The remote call is best-effort: a failure is logged and the
    /// local transition to [AuthStatus::Unauthenticated] happens anyway.
    pub async fn logout(&self) -> AuthStatus {
        let _guard = self.transition.lock().await;
        if let Err(err) = self.client.logout().await {
            warn!(%err, "logout call failed, clearing local session anyway");
        }
        let next = AuthStatus::Unauthenticated { error: None };
        self.set(next.clone());
        next
    }
}
