//! HTTP client for the Mini-App backend
//!
//! Every request carries the host platform's session token (Telegram
//! `initData`) verbatim in the `Authorization` header.

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::game::model::{ModelError, ModelFetcher};
use crate::network::protocol::{
    ModelRequest, ModelResponse, StateResponse, TapRequest, TapResponse, WalletRequest,
    WalletResponse, MODEL_PATH, STATE_PATH, TAP_PATH, WALLET_CONNECT_PATH,
};

/// Sync request errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    /// Connection, TLS or timeout failure.
    #[error("network error on {endpoint}: {source}")]
    Transport {
        /// Request path.
        endpoint: &'static str,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// Server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Request path.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// Response body was not the expected JSON.
    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        /// Request path.
        endpoint: &'static str,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Request task was aborted or outlived the shutdown deadline.
    #[error("request interrupted: {0}")]
    Interrupted(String),
}

impl SyncError {
    /// Transport failure or non-success status.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::Status { .. })
    }

    /// Status was 401: the session token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SyncError::Status { status: 401, .. })
    }
}

/// Backend operations used by the session.
pub trait GameApi {
    /// Load the full player state.
    fn fetch_state(&self) -> impl Future<Output = Result<StateResponse, SyncError>> + Send;

    /// Send a batch of taps.
    fn send_taps(&self, taps: u32) -> impl Future<Output = Result<TapResponse, SyncError>> + Send;

    /// Store a new character model URL.
    fn update_model_url(
        &self,
        model_url: &str,
    ) -> impl Future<Output = Result<ModelResponse, SyncError>> + Send;

    /// Link a wallet address.
    fn connect_wallet(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<WalletResponse, SyncError>> + Send;
}

/// reqwest-backed implementation of [`GameApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    init_data: String,
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("hypetown-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SyncError::Build)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            init_data: config.init_data.clone(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T, SyncError> {
        debug!("GET {}", endpoint);
        let result = self
            .http
            .get(self.url(endpoint))
            .header(AUTHORIZATION, self.init_data.as_str())
            .send()
            .await;
        let response = result.map_err(|source| SyncError::Transport { endpoint, source });
        Self::decode(endpoint, response).await.inspect_err(|e| {
            error!("GET {} failed: {}", endpoint, e);
        })
    }

    async fn post<B, T>(&self, endpoint: &'static str, body: &B) -> Result<T, SyncError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", endpoint);
        let result = self
            .http
            .post(self.url(endpoint))
            .header(AUTHORIZATION, self.init_data.as_str())
            .json(body)
            .send()
            .await;
        let response = result.map_err(|source| SyncError::Transport { endpoint, source });
        Self::decode(endpoint, response).await.inspect_err(|e| {
            error!("POST {} failed: {}", endpoint, e);
        })
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        response: Result<reqwest::Response, SyncError>,
    ) -> Result<T, SyncError> {
        let response = response?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| SyncError::Transport { endpoint, source })?;
        serde_json::from_str(&body).map_err(|source| SyncError::Decode { endpoint, source })
    }
}

impl GameApi for ApiClient {
    async fn fetch_state(&self) -> Result<StateResponse, SyncError> {
        self.get(STATE_PATH).await
    }

    async fn send_taps(&self, taps: u32) -> Result<TapResponse, SyncError> {
        self.post(TAP_PATH, &TapRequest { taps }).await
    }

    async fn update_model_url(&self, model_url: &str) -> Result<ModelResponse, SyncError> {
        let body = ModelRequest {
            model_url: model_url.to_string(),
        };
        self.post(MODEL_PATH, &body).await
    }

    async fn connect_wallet(&self, address: &str) -> Result<WalletResponse, SyncError> {
        let body = WalletRequest {
            address: address.to_string(),
        };
        self.post(WALLET_CONNECT_PATH, &body).await
    }
}

impl ModelFetcher for ApiClient {
    async fn fetch_model(&self, url: &str) -> Result<Vec<u8>, ModelError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let config = ClientConfig {
            api_base_url: "http://localhost:9000/".into(),
            ..Default::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.url(TAP_PATH), "http://localhost:9000/api/tap");
    }

    #[test]
    fn test_error_classification() {
        let status = SyncError::Status { endpoint: TAP_PATH, status: 401 };
        assert!(status.is_network());
        assert!(status.is_unauthorized());

        let decode = SyncError::Decode {
            endpoint: STATE_PATH,
            source: serde_json::from_str::<TapResponse>("nope").unwrap_err(),
        };
        assert!(!decode.is_network());
        assert!(decode.to_string().contains("/api/state"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Grab a free port and release it so nothing is listening there.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ClientConfig {
            api_base_url: format!("http://127.0.0.1:{}", port),
            request_timeout: std::time::Duration::from_millis(500),
            ..Default::default()
        };
        let client = ApiClient::new(&config).unwrap();
        let err = client.send_taps(3).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport { endpoint: TAP_PATH, .. }));
    }
}
