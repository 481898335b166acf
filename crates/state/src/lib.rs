//! Versioned application state for the trace viewer.
//!
//! This crate is the data half of the viewer core: the [`State`] aggregate,
//! the closed [`Action`] sum type describing every permitted mutation, the
//! pure [`reduce`] transition function, and the [`Model`] that owns the
//! current value. The dispatch loop that drives controllers to quiescence
//! lives in the `hub` crate.

mod actions;
mod model;
mod reducer;
mod types;

pub use actions::{Action, Direction};
pub use model::Model;
pub use reducer::{reduce, ReduceError};
pub use types::{
    DataRequest, Engine, EngineId, Permalink, Query, QueryId, State, Status, TimeWindow,
    TraceSource, Track, TrackConfig, TrackId, VIEWER_ROUTE,
};
