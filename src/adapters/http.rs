//! `reqwest` implementation of the client [`Transport`] seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::client::transport::{ApiRequest, ApiResponse, Transport};
use crate::error::{FatalError, TransportError};

pub struct ReqwestTransport {
    http: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// `request_timeout` bounds each attempt; the client's deadline bounds
    /// the whole call.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, FatalError> {
        Url::parse(base_url).map_err(|e| FatalError::ClientSetup(e.to_string()))?;
        let http = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("edge-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FatalError::ClientSetup(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.http.request(request.method, self.url(&request.path));
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}
