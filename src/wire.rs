//! Serde types mirroring the remote session service's JSON contract.
//!
//! The remote endpoint is a plain request/response HTTP service:
//!
//! - `POST /session/new` creates a session (optionally seeded),
//! - `POST /step` advances it with an explicit action,
//! - `POST /agent_step` advances it with the server-side policy choosing,
//! - `POST /reset` restarts the episode in place,
//! - `GET /health` is a liveness probe.
//!
//! Frames arrive as base64-encoded images and are treated as opaque strings
//! all the way to the UI layer. Observation vectors are carried but never
//! interpreted by the client core.

use serde::{Deserialize, Serialize};

/// Request body for `POST /session/new`.
///
/// Two creations issued with the same `seed` yield terrain-equivalent initial
/// observations on the remote side; the duel mode depends on this guarantee.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRequest {
    /// Environment identifier, e.g. `"LunarLander-v3"`.
    pub env_id: String,
    /// Optional deterministic seed for the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Optional pole-angle threshold override (degrees), for environments
    /// that expose one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_deg: Option<f64>,
    /// Optional cart-position threshold override, for environments that
    /// expose one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_threshold: Option<f64>,
    /// Optional cap on episode length in ticks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Requested render width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_w: Option<u32>,
    /// Requested render height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_h: Option<u32>,
}

/// Response body for `POST /session/new`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    /// Opaque identifier assigned by the remote endpoint. Unique per handle.
    pub session_id: String,
    /// Initial observation vector. Opaque to the client core.
    #[serde(default)]
    pub obs: Vec<f64>,
    /// Initial rendered frame, base64-encoded.
    pub frame: String,
    /// Whether the episode is already complete (normally false at creation).
    pub done: bool,
}

/// Request body for `POST /step`.
#[derive(Debug, Clone, Serialize)]
pub struct StepRequest {
    /// Target session.
    pub session_id: String,
    /// Discrete action code, see [`Action`](crate::Action).
    pub action: u8,
    /// How many simulation ticks to execute in this one round trip.
    pub repeat: u32,
}

/// Request body for `POST /agent_step`. The action is chosen server-side.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStepRequest {
    /// Target session.
    pub session_id: String,
    /// How many simulation ticks to execute in this one round trip.
    pub repeat: u32,
}

/// Response body for `POST /step` and `POST /agent_step`.
#[derive(Debug, Clone, Deserialize)]
pub struct StepResponse {
    /// Observation vector after the executed ticks.
    #[serde(default)]
    pub obs: Vec<f64>,
    /// Reward accumulated over the executed ticks, if any were executed.
    pub reward: Option<f64>,
    /// Whether the episode completed during this call.
    pub done: bool,
    /// Rendered frame after the executed ticks, base64-encoded.
    pub frame: String,
    /// For agent steps, the last action the server-side policy chose.
    pub action: Option<u8>,
    /// How many ticks were actually executed. May be less than requested if
    /// the episode ended mid-batch.
    pub steps: Option<u32>,
}

/// Request body for `POST /reset`.
#[derive(Debug, Clone, Serialize)]
pub struct ResetRequest {
    /// Target session.
    pub session_id: String,
}

/// Response body for `POST /reset`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetResponse {
    /// Observation vector after the reset.
    #[serde(default)]
    pub obs: Vec<f64>,
    /// Rendered frame after the reset, base64-encoded.
    pub frame: String,
    /// Always false after a successful reset.
    pub done: bool,
}

/// Error body the remote attaches to non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description of the failure. This text is the only
    /// structured signal the remote contract offers.
    pub detail: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// True when the service is up.
    pub ok: bool,
}
