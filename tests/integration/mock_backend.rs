//! Scripted backend for integration tests.
//!
//! Implements the client `Transport` seam.  The login route issues
//! `tok-1`, `tok-2`, ... and remembers which tokens are valid; any data
//! call with an unknown token gets a 401.  Other routes replay a per-path
//! script and fall back to a per-path default (or `200 {}`).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use edge_agent::client::transport::{ApiRequest, ApiResponse, Transport};
use edge_agent::error::TransportError;

pub const LOGIN: &str = "/auth/login";

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Step {
    Respond(u16, String),
    Fail(TransportError),
    /// Never answer.
    Hang,
}

#[derive(Default)]
struct State {
    logins: u32,
    valid: HashSet<String>,
    reject_all: bool,
    login_status: Option<u16>,
    login_delay: Duration,
    expires_in: Option<u64>,
    script: HashMap<String, VecDeque<Step>>,
    defaults: HashMap<String, (u16, String)>,
    requests: Vec<ApiRequest>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    state: Mutex<State>,
}

#[allow(dead_code)]
impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `steps` for `path`, in order.
    pub fn script(&self, path: &str, steps: impl IntoIterator<Item = Step>) {
        self.state
            .lock()
            .unwrap()
            .script
            .entry(path.into())
            .or_default()
            .extend(steps);
    }

    pub fn respond_with(&self, path: &str, status: u16, body: &str) {
        self.state
            .lock()
            .unwrap()
            .defaults
            .insert(path.into(), (status, body.into()));
    }

    /// Invalidate every token issued so far.
    pub fn expire_tokens(&self) {
        self.state.lock().unwrap().valid.clear();
    }

    /// Answer 401 to every data call, even with a fresh token.
    pub fn reject_all_tokens(&self) {
        self.state.lock().unwrap().reject_all = true;
    }

    pub fn fail_login(&self, status: u16) {
        self.state.lock().unwrap().login_status = Some(status);
    }

    pub fn slow_login(&self, delay: Duration) {
        self.state.lock().unwrap().login_delay = delay;
    }

    pub fn token_lifetime(&self, secs: u64) {
        self.state.lock().unwrap().expires_in = Some(secs);
    }

    pub fn logins(&self) -> u32 {
        self.state.lock().unwrap().logins
    }

    /// Data requests (everything but login), in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    async fn login(&self) -> Result<ApiResponse, TransportError> {
        let delay = self.state.lock().unwrap().login_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut s = self.state.lock().unwrap();
        s.logins += 1;
        if let Some(status) = s.login_status {
            return Ok(ApiResponse::new(status, "login refused"));
        }
        let token = format!("tok-{}", s.logins);
        s.valid.insert(token.clone());
        let body = match s.expires_in {
            Some(secs) => format!(r#"{{"access_token":"{token}","expires_in":{secs}}}"#),
            None => format!(r#"{{"token":"{token}"}}"#),
        };
        Ok(ApiResponse::new(200, body))
    }
}

#[async_trait]
impl Transport for ScriptedBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        if request.path == LOGIN {
            return self.login().await;
        }
        let step = {
            let mut s = self.state.lock().unwrap();
            s.requests.push(request.clone());
            let authorized = !s.reject_all
                && request
                    .bearer
                    .as_ref()
                    .is_some_and(|t| s.valid.contains(t));
            if !authorized {
                return Ok(ApiResponse::new(401, "unauthorized"));
            }
            match s.script.get_mut(&request.path).and_then(|q| q.pop_front()) {
                Some(step) => step,
                None => {
                    let (status, body) = s
                        .defaults
                        .get(&request.path)
                        .cloned()
                        .unwrap_or((200, "{}".into()));
                    Step::Respond(status, body)
                }
            }
        };
        match step {
            Step::Respond(status, body) => Ok(ApiResponse::new(status, body)),
            Step::Fail(e) => Err(e),
            Step::Hang => std::future::pending().await,
        }
    }
}
