//! Entities making up the viewer's single state aggregate.
//!
//! `State` is treated as a value: every transition produces a new `State`
//! and published snapshots are never mutated in place. All maps are
//! `BTreeMap` so iteration order and serialized form are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier of a trace-processing engine instance.
pub type EngineId = String;
/// Identifier of a displayed track.
pub type TrackId = String;
/// Identifier of a user-issued query.
pub type QueryId = String;

/// Opaque per-track configuration, interpreted only by track implementations.
pub type TrackConfig = BTreeMap<String, serde_json::Value>;

/// Route the viewer navigates to when a trace is opened.
pub const VIEWER_ROUTE: &str = "/viewer";

/// A span of trace time plus the wall-clock instant it was last written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the span in trace seconds.
    pub start_sec: f64,
    /// End of the span in trace seconds. Always >= `start_sec`.
    pub end_sec: f64,
    /// Unix timestamp of the last update, 0 for the placeholder.
    pub last_update_sec: f64,
}

impl TimeWindow {
    /// Fixed span shown before any trace data is available.
    pub fn placeholder() -> Self {
        Self {
            start_sec: 0.0,
            end_sec: 10.0,
            last_update_sec: 0.0,
        }
    }

    /// Length of the span in trace seconds.
    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Where the bytes of a trace come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceSource {
    /// A local file handed over by the user.
    File(PathBuf),
    /// A remote trace fetched over HTTP.
    Url(String),
}

/// One trace-processing backend instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    /// Map key, allocated from `State::next_id`.
    pub id: EngineId,
    /// Flips to true exactly once, when the out-of-band readiness signal
    /// arrives. Never transitions back.
    pub ready: bool,
    /// Trace source this engine was opened for.
    pub source: TraceSource,
}

/// Outstanding request for track data covering a time span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Start of the requested span in trace seconds.
    pub start_sec: f64,
    /// End of the requested span in trace seconds.
    pub end_sec: f64,
    /// Resolution hint in seconds per bucket.
    pub resolution: f64,
}

/// One displayed track bound to an engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Map key, allocated from `State::next_id`.
    pub id: TrackId,
    /// Engine this track reads from. Not validated by the reducer;
    /// controllers own referential integrity here.
    pub engine_id: EngineId,
    /// Track kind discriminator (e.g. "CpuSliceTrack").
    pub kind: String,
    /// Human-readable name shown next to the track.
    pub name: String,
    /// Opaque configuration interpreted by the track implementation.
    pub config: TrackConfig,
    /// At most one outstanding data request; a new request overwrites any
    /// prior one (most recent viewport wins).
    pub data_request: Option<DataRequest>,
}

/// A user-issued query bound to an engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Map key, chosen by the caller.
    pub id: QueryId,
    /// Engine the query runs against.
    pub engine_id: EngineId,
    /// Query text.
    pub text: String,
}

/// In-flight create/load exchange for a shareable link.
///
/// The `request_id` correlates asynchronous responses with the request that
/// produced them; responses carrying a stale id are dropped by the reducer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permalink {
    /// Correlation id of the exchange currently in flight.
    pub request_id: String,
    /// Resolved link hash, None while the exchange is pending.
    pub hash: Option<String>,
}

/// Status line shown at the bottom of the viewer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Message text.
    pub msg: String,
    /// Unix timestamp of when the message was set.
    pub timestamp_sec: f64,
}

/// The single authoritative application state.
///
/// Owned exclusively by `Model`; every other component observes snapshots
/// and requests changes through `Action`s. The whole aggregate serializes
/// losslessly, which is what the permalink flow relies on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Current top-level navigation location.
    pub route: String,
    /// Sole source of new engine/track ids. Never reused, never decremented.
    pub next_id: u64,
    /// Registered engines keyed by id.
    pub engines: BTreeMap<EngineId, Engine>,
    /// Full bounds of the loaded trace.
    pub trace_time: TimeWindow,
    /// Currently visible viewport.
    pub visible_trace_time: TimeWindow,
    /// All tracks keyed by id.
    pub tracks: BTreeMap<TrackId, Track>,
    /// Ordered ids of tracks pinned above the scroll area.
    ///
    /// Together with `scrolling_tracks` this partitions the key set of
    /// `tracks`: every track id appears in exactly one of the two lists.
    pub pinned_tracks: Vec<TrackId>,
    /// Ordered ids of tracks in the scroll area.
    pub scrolling_tracks: Vec<TrackId>,
    /// User-issued queries keyed by id.
    pub queries: BTreeMap<QueryId, Query>,
    /// Permalink exchange in flight, if any.
    pub permalink: Option<Permalink>,
    /// Status line contents.
    pub status: Status,
}

impl State {
    /// Canonical initial value: no trace, placeholder time windows.
    pub fn empty() -> Self {
        Self {
            route: String::from("/"),
            next_id: 0,
            engines: BTreeMap::new(),
            trace_time: TimeWindow::placeholder(),
            visible_trace_time: TimeWindow::placeholder(),
            tracks: BTreeMap::new(),
            pinned_tracks: Vec::new(),
            scrolling_tracks: Vec::new(),
            queries: BTreeMap::new(),
            permalink: None,
            status: Status::default(),
        }
    }

    /// Allocates the next monotonic id and renders it as a map key.
    pub(crate) fn alloc_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::empty()
    }
}
