//! The trait seam over the remote session service, plus its HTTP
//! implementation.
//!
//! Everything the loops know about the remote side goes through [`Endpoint`].
//! Tests script a mock implementation; production wires up [`HttpEndpoint`].
//!
//! Error classification happens here and only here. The remote contract
//! carries no machine-readable error code, so [`classify_remote`] inspects
//! the HTTP status and the detail text once, at the boundary, and everything
//! above it works with the structured [`EndpointError`] kinds.
//!
//! [`classify_remote`]: EndpointError::classify_remote

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::wire::{
    AgentStepRequest, CreateRequest, CreateResponse, ErrorBody, HealthResponse, ResetRequest,
    ResetResponse, StepRequest, StepResponse,
};

/// Per-request deadline for the HTTP implementation.
///
/// This is the transport's own deadline; the loops impose no additional
/// timeout, so a stuck call simply delays the next tick.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// The detail text the remote uses to signal a vanished session.
///
/// Matching is case-insensitive substring, confined to
/// [`EndpointError::classify_remote`].
const SESSION_NOT_FOUND_DETAIL: &str = "session not found";

/// Errors produced at the endpoint boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum EndpointError {
    /// The remote reported that the target session no longer exists. The
    /// loops recover from this transparently by recreating the session.
    SessionNotFound {
        /// The detail text the remote attached.
        detail: String,
    },
    /// Any other non-success response from the remote.
    Remote {
        /// HTTP status code.
        status: u16,
        /// The detail text the remote attached, or the raw body.
        detail: String,
    },
    /// The request never produced a response (connect failure, timeout,
    /// broken connection).
    Transport {
        /// A description of the transport failure.
        context: String,
    },
    /// The response arrived but its body did not match the expected shape.
    Decode {
        /// A description of the decode failure.
        context: String,
    },
}

impl EndpointError {
    /// Whether this error means the remote session vanished and a new one
    /// must be created.
    #[must_use]
    pub fn is_session_lost(&self) -> bool {
        matches!(self, EndpointError::SessionNotFound { .. })
    }

    /// Classifies a non-success remote response.
    ///
    /// The remote signals a vanished session through its detail text rather
    /// than a typed code, so this is the one place substring matching is
    /// allowed. Widen here if the remote contract ever grows more
    /// recoverable conditions.
    #[must_use]
    pub fn classify_remote(status: u16, detail: String) -> Self {
        if status == 404 && detail.to_ascii_lowercase().contains(SESSION_NOT_FOUND_DETAIL) {
            EndpointError::SessionNotFound { detail }
        } else {
            EndpointError::Remote { status, detail }
        }
    }
}

impl Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::SessionNotFound { detail } => {
                write!(f, "session not found: {}", detail)
            }
            EndpointError::Remote { status, detail } => {
                write!(f, "remote error (HTTP {}): {}", status, detail)
            }
            EndpointError::Transport { context } => {
                write!(f, "transport error: {}", context)
            }
            EndpointError::Decode { context } => {
                write!(f, "decode error: {}", context)
            }
        }
    }
}

impl Error for EndpointError {}

/// The remote session service as the loops see it.
///
/// One session is one remote simulation instance. `create` may carry a seed;
/// two creations with the same seed are terrain-equivalent, which is the
/// guarantee the duel mode builds on. No delete call exists in the observed
/// contract: abandoning a session is implicit, the old handle is simply
/// dropped.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Creates a new session.
    async fn create(&self, req: CreateRequest) -> Result<CreateResponse, EndpointError>;

    /// Advances a session by up to `repeat` ticks with an explicit action.
    async fn step(&self, req: StepRequest) -> Result<StepResponse, EndpointError>;

    /// Advances a session by up to `repeat` ticks, the server-side policy
    /// choosing each action.
    async fn agent_step(&self, req: AgentStepRequest) -> Result<StepResponse, EndpointError>;

    /// Restarts the episode in place. The session identity is unchanged.
    async fn reset(&self, req: ResetRequest) -> Result<ResetResponse, EndpointError>;

    /// Liveness probe. Defaults to healthy for endpoints without one.
    async fn health(&self) -> Result<bool, EndpointError> {
        Ok(true)
    }
}

/// [`Endpoint`] implementation over HTTP, matching the observed service:
/// JSON bodies, `{"detail": ...}` error payloads, frames as base64 strings.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEndpoint {
    /// Creates an endpoint rooted at `base_url` (with or without a trailing
    /// slash) using a client with the default request deadline.
    ///
    /// # Errors
    /// Returns [`EndpointError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, EndpointError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| EndpointError::Transport {
                context: err.to_string(),
            })?;
        Ok(Self::with_client(base_url, client))
    }

    /// Creates an endpoint with a caller-provided client (custom deadlines,
    /// proxies, headers).
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// The base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, EndpointError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| EndpointError::Transport {
                context: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&raw)
                .map(|body| body.detail)
                .unwrap_or(raw);
            return Err(EndpointError::classify_remote(status.as_u16(), detail));
        }

        response
            .json::<R>()
            .await
            .map_err(|err| EndpointError::Decode {
                context: err.to_string(),
            })
    }
}

#[async_trait]
impl Endpoint for HttpEndpoint {
    async fn create(&self, req: CreateRequest) -> Result<CreateResponse, EndpointError> {
        self.post_json("/session/new", &req).await
    }

    async fn step(&self, req: StepRequest) -> Result<StepResponse, EndpointError> {
        self.post_json("/step", &req).await
    }

    async fn agent_step(&self, req: AgentStepRequest) -> Result<StepResponse, EndpointError> {
        self.post_json("/agent_step", &req).await
    }

    async fn reset(&self, req: ResetRequest) -> Result<ResetResponse, EndpointError> {
        self.post_json("/reset", &req).await
    }

    async fn health(&self) -> Result<bool, EndpointError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| EndpointError::Transport {
                context: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: HealthResponse = response.json().await.map_err(|err| EndpointError::Decode {
            context: err.to_string(),
        })?;
        Ok(body.ok)
    }
}
