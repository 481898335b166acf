//! The closed set of intents that can mutate viewer state.
//!
//! Actions are pure data. Anything the reducer must not compute itself
//! (wall-clock timestamps, permalink request ids) is baked into the action
//! by the `*_now` constructors at creation time, so replaying a recorded
//! action sequence is deterministic.

use crate::types::{EngineId, QueryId, State, TraceSource, TrackConfig, TrackId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Direction of a track move relative to the combined ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// A discrete, immutable description of an intended state change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Set the current top-level navigation location.
    Navigate { route: String },
    /// Open a trace: reset the time windows, drop displayed tracks, and
    /// register a fresh (not yet ready) engine for `source`.
    OpenTrace { source: TraceSource },
    /// Register a new track at the end of the scrolling list.
    AddTrack {
        engine_id: EngineId,
        kind: String,
        name: String,
        config: TrackConfig,
    },
    /// Overwrite a track's outstanding data request (last request wins).
    RequestTrackData {
        track_id: TrackId,
        start_sec: f64,
        end_sec: f64,
        resolution: f64,
    },
    /// Clear a track's outstanding data request.
    ClearTrackDataRequest { track_id: TrackId },
    /// Insert or replace a query.
    ExecuteQuery {
        engine_id: EngineId,
        query_id: QueryId,
        text: String,
    },
    /// Remove a query.
    DeleteQuery { query_id: QueryId },
    /// Move a track one slot up or down in the combined ordering.
    MoveTrack {
        track_id: TrackId,
        direction: Direction,
    },
    /// Move a track across the pinned/scrolling boundary.
    ToggleTrackPinned { track_id: TrackId },
    /// Record an engine's readiness signal.
    SetEngineReady { engine_id: EngineId, ready: bool },
    /// Start a new create-permalink exchange.
    CreatePermalink { request_id: String },
    /// Resolve the in-flight exchange; dropped if `request_id` is stale.
    SetPermalink { request_id: String, hash: String },
    /// Start an exchange for a known hash (no round-trip needed).
    LoadPermalink { request_id: String, hash: String },
    /// Wholesale state replacement, used to hydrate from a permalink load.
    ReplaceState { state: Box<State> },
    /// Overwrite the full trace-time bounds.
    SetTraceTime {
        start_sec: f64,
        end_sec: f64,
        last_update_sec: f64,
    },
    /// Overwrite the visible viewport.
    SetVisibleTraceTime {
        start_sec: f64,
        end_sec: f64,
        last_update_sec: f64,
    },
    /// Overwrite the status line.
    UpdateStatus { msg: String, timestamp_sec: f64 },
}

impl Action {
    /// `SetTraceTime` stamped with the current wall clock.
    pub fn set_trace_time_now(start_sec: f64, end_sec: f64) -> Self {
        Action::SetTraceTime {
            start_sec,
            end_sec,
            last_update_sec: unix_now_sec(),
        }
    }

    /// `SetVisibleTraceTime` stamped with the current wall clock.
    pub fn set_visible_trace_time_now(start_sec: f64, end_sec: f64) -> Self {
        Action::SetVisibleTraceTime {
            start_sec,
            end_sec,
            last_update_sec: unix_now_sec(),
        }
    }

    /// `UpdateStatus` stamped with the current wall clock.
    pub fn update_status_now(msg: impl Into<String>) -> Self {
        Action::UpdateStatus {
            msg: msg.into(),
            timestamp_sec: unix_now_sec(),
        }
    }

    /// `CreatePermalink` with a freshly generated request id.
    pub fn create_permalink_now() -> Self {
        Action::CreatePermalink {
            request_id: fresh_request_id(),
        }
    }

    /// `LoadPermalink` for `hash`, with a freshly generated request id.
    pub fn load_permalink_now(hash: impl Into<String>) -> Self {
        Action::LoadPermalink {
            request_id: fresh_request_id(),
            hash: hash.into(),
        }
    }
}

fn unix_now_sec() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn fresh_request_id() -> String {
    // Nanosecond wall-clock rendering, unique enough to correlate one
    // in-flight exchange against its async response.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().to_string())
        .unwrap_or_else(|_| String::from("0"))
}
