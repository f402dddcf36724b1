//! Resilient backend client: the only component that talks HTTP.
//!
//! ```text
//!   SensorManager ──┐
//!                   ├──▶ ResilientClient ──▶ Transport ──▶ backend
//!  ActuatorManager ─┘      retry · backoff · single-flight re-auth
//! ```
//!
//! ## Failure policy
//!
//! | Attempt outcome          | Action                                       |
//! |--------------------------|----------------------------------------------|
//! | 2xx                      | return the response                          |
//! | transport error, 5xx     | back off and retry, up to `max_retries`      |
//! | 401                      | re-authenticate once, retry once             |
//! | 401 after re-auth        | [`ClientError::Unauthorized`]                |
//! | other 4xx                | [`ClientError::Rejected`], no retry          |
//!
//! Every call also carries a deadline; backoff sleeps and attempts are both
//! bounded by it.  Dropping the returned future cancels the call at the next
//! await point, which is how loop shutdown reaches in-flight requests.

pub mod retry;
pub mod session;
pub mod transport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{BackendConfig, RetryConfig};
use crate::error::ClientError;
use retry::{RetryPolicy, RetryState};
use session::{Session, SessionStore};
use transport::{ApiRequest, ApiResponse, Transport};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "token")]
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Classified outcome of a single attempt.
enum Attempt {
    Done(ApiResponse),
    Transient(String),
    AuthExpired,
    Rejected(ApiResponse),
}

fn classify(result: Result<ApiResponse, crate::error::TransportError>) -> Attempt {
    match result {
        Err(e) => Attempt::Transient(e.to_string()),
        Ok(r) if r.is_success() => Attempt::Done(r),
        Ok(r) if r.status == 401 => Attempt::AuthExpired,
        Ok(r) if r.status >= 500 => Attempt::Transient(format!("HTTP {}", r.status)),
        Ok(r) => Attempt::Rejected(r),
    }
}

/// Bound an authentication step by the call deadline.
async fn within<T>(
    deadline: Instant,
    attempts: u32,
    step: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::time::timeout_at(deadline, step)
        .await
        .unwrap_or(Err(ClientError::DeadlineExceeded { attempts }))
}

pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    login_path: String,
    policy: RetryPolicy,
    session: SessionStore,
}

impl ResilientClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        login_path: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            credentials,
            login_path: login_path.into(),
            policy,
            session: SessionStore::new(),
        }
    }

    pub fn from_config(
        transport: Arc<dyn Transport>,
        backend: &BackendConfig,
        retry: &RetryConfig,
    ) -> Self {
        Self::new(
            transport,
            Credentials {
                username: backend.username.clone(),
                password: backend.password.clone(),
            },
            backend.login_path.clone(),
            RetryPolicy::from(retry),
        )
    }

    /// Authenticate eagerly.  Optional: the first request logs in on demand.
    pub async fn login(&self) -> Result<(), ClientError> {
        self.session.lease(|| self.exchange_credentials()).await?;
        Ok(())
    }

    /// Issue one logical request with retry, backoff and re-authentication.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, ClientError> {
        if !path.starts_with('/') {
            return Err(ClientError::InvalidRequest(format!(
                "path '{path}' must start with '/'"
            )));
        }
        let deadline = Instant::now() + self.policy.deadline;
        let mut retry = RetryState::new(&self.policy);
        let mut reauthenticated = false;

        let mut lease = within(
            deadline,
            0,
            self.session.lease(|| self.exchange_credentials()),
        )
        .await?;

        loop {
            let request = ApiRequest {
                method: method.clone(),
                path: path.to_string(),
                body: body.cloned(),
                bearer: Some(lease.token.clone()),
            };

            let sent = tokio::time::timeout_at(deadline, self.transport.send(request)).await;
            let Ok(result) = sent else {
                warn!("client: {} {} hit its deadline", method, path);
                return Err(ClientError::DeadlineExceeded {
                    attempts: retry.attempts(),
                });
            };

            match classify(result) {
                Attempt::Done(response) => {
                    debug!(
                        "client: {} {} -> {} (attempt {})",
                        method,
                        path,
                        response.status,
                        retry.attempts()
                    );
                    return Ok(response);
                }
                Attempt::Rejected(response) => {
                    warn!("client: {} {} rejected ({})", method, path, response.status);
                    return Err(ClientError::Rejected {
                        status: response.status,
                        body: response.body_text(),
                    });
                }
                Attempt::AuthExpired => {
                    if reauthenticated {
                        warn!("client: {} {} unauthorized after re-auth", method, path);
                        return Err(ClientError::Unauthorized);
                    }
                    reauthenticated = true;
                    info!("client: token rejected, re-authenticating");
                    let refresh = self
                        .session
                        .refresh(lease.generation, || self.exchange_credentials());
                    lease = within(deadline, retry.attempts(), refresh).await?;
                }
                Attempt::Transient(reason) => {
                    let Some(delay) = retry.next_delay() else {
                        warn!(
                            "client: {} {} failed after {} attempts: {}",
                            method,
                            path,
                            retry.attempts(),
                            reason
                        );
                        return Err(ClientError::RetriesExhausted {
                            attempts: retry.attempts(),
                            last_error: reason,
                        });
                    };
                    if Instant::now() + delay >= deadline {
                        return Err(ClientError::DeadlineExceeded {
                            attempts: retry.attempts() - 1,
                        });
                    }
                    debug!(
                        "client: {} {} transient failure ({}), retry {} in {:?}",
                        method,
                        path,
                        reason,
                        retry.retries(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ClientError> {
        let value =
            serde_json::to_value(body).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        self.request(Method::POST, path, Some(&value)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, None).await?.json()
    }

    /// One credential exchange.  Never retried: a failure here propagates
    /// straight to the caller.
    async fn exchange_credentials(&self) -> Result<Session, ClientError> {
        let body = serde_json::to_value(LoginRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
        })
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let request = ApiRequest {
            method: Method::POST,
            path: self.login_path.clone(),
            body: Some(body),
            bearer: None,
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::AuthFailed(e.to_string()))?;
        if !response.is_success() {
            return Err(ClientError::AuthFailed(format!(
                "login returned HTTP {}",
                response.status
            )));
        }
        let login: LoginResponse = response
            .json()
            .map_err(|e| ClientError::AuthFailed(e.to_string()))?;
        let expires_at = login
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        info!("client: authenticated as '{}'", self.credentials.username);
        Ok(Session::new(login.access_token, expires_at))
    }
}
