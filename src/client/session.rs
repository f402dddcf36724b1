//! Session ownership and single-flight re-authentication.
//!
//! The token lives in one [`SessionStore`] owned by the client.  Callers
//! borrow it as a [`Lease`] tagged with the generation it came from.  When a
//! lease is rejected, [`SessionStore::refresh`] re-authenticates only if no
//! one else has already replaced that generation; callers queued behind an
//! in-flight refresh reuse its result, success or failure.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::ClientError;

/// Bearer token plus optional expiry hint.
#[derive(Clone)]
pub struct Session {
    token: String,
    expires_at: Option<Instant>,
}

impl Session {
    pub fn new(token: String, expires_at: Option<Instant>) -> Self {
        Self { token, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A token borrowed for one attempt.
#[derive(Debug, Clone)]
pub(crate) struct Lease {
    pub token: String,
    pub generation: u64,
}

#[derive(Default)]
struct Slot {
    session: Option<Session>,
    generation: u64,
    /// Failure of the refresh that tried to replace `generation`.
    failed: Option<(u64, ClientError)>,
}

#[derive(Default)]
pub(crate) struct SessionStore {
    slot: Mutex<Slot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, authenticating first when there is none or it has
    /// passed its expiry hint.
    pub async fn lease<F, Fut>(&self, login: F) -> Result<Lease, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, ClientError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(s) = &slot.session {
            if !s.is_expired() {
                return Ok(Lease {
                    token: s.token.clone(),
                    generation: slot.generation,
                });
            }
        }
        Self::replace(&mut slot, login).await
    }

    /// Replace the token of `stale_generation`.  A no-op returning the newer
    /// token when another caller already did it.
    pub async fn refresh<F, Fut>(
        &self,
        stale_generation: u64,
        login: F,
    ) -> Result<Lease, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, ClientError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((generation, err)) = &slot.failed {
            if *generation == stale_generation {
                return Err(err.clone());
            }
        }
        if slot.generation != stale_generation {
            if let Some(s) = &slot.session {
                return Ok(Lease {
                    token: s.token.clone(),
                    generation: slot.generation,
                });
            }
        }
        Self::replace(&mut slot, login).await
    }

    /// Holds the slot lock across the exchange: that is the single flight.
    async fn replace<F, Fut>(slot: &mut Slot, login: F) -> Result<Lease, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, ClientError>>,
    {
        let attempted = slot.generation;
        match login().await {
            Ok(session) => {
                slot.generation += 1;
                slot.failed = None;
                let lease = Lease {
                    token: session.token.clone(),
                    generation: slot.generation,
                };
                slot.session = Some(session);
                Ok(lease)
            }
            Err(e) => {
                slot.session = None;
                slot.failed = Some((attempted, e.clone()));
                Err(e)
            }
        }
    }
}
