//! Pure state-transition function.
//!
//! `reduce` is total, deterministic, and side-effect free: it never blocks,
//! never touches a clock, and computes the next state from nothing but its
//! arguments. It works on a clone of the input, so a rejected action leaves
//! the caller's value untouched.

use crate::actions::{Action, Direction};
use crate::types::{
    DataRequest, Engine, Permalink, Query, State, Status, TimeWindow, Track, VIEWER_ROUTE,
};
use thiserror::Error;

/// An action the reducer rejected. The state is unchanged in every case.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReduceError {
    /// The referenced track id is in neither ordering list; the caller's
    /// view of the track layout has desynced from the state.
    #[error("no track with id {0} in either track list")]
    UnknownTrack(String),
    /// The referenced engine id is not registered.
    #[error("no engine with id {0}")]
    UnknownEngine(String),
}

/// Computes the state after `action`.
pub fn reduce(state: &State, action: &Action) -> Result<State, ReduceError> {
    let mut next = state.clone();
    match action {
        Action::Navigate { route } => {
            next.route = route.clone();
        }

        Action::OpenTrace { source } => {
            next.trace_time = TimeWindow::placeholder();
            next.visible_trace_time = TimeWindow::placeholder();
            // Displayed tracks are dropped, not migrated to the new engine.
            next.tracks.clear();
            next.pinned_tracks.clear();
            next.scrolling_tracks.clear();
            let id = next.alloc_id();
            next.engines.insert(
                id.clone(),
                Engine {
                    id,
                    ready: false,
                    source: source.clone(),
                },
            );
            next.route = String::from(VIEWER_ROUTE);
        }

        Action::AddTrack {
            engine_id,
            kind,
            name,
            config,
        } => {
            let id = next.alloc_id();
            next.tracks.insert(
                id.clone(),
                Track {
                    id: id.clone(),
                    engine_id: engine_id.clone(),
                    kind: kind.clone(),
                    name: name.clone(),
                    config: config.clone(),
                    data_request: None,
                },
            );
            next.scrolling_tracks.push(id);
        }

        Action::RequestTrackData {
            track_id,
            start_sec,
            end_sec,
            resolution,
        } => {
            // Unknown track: harmless race with a concurrent track removal.
            if let Some(track) = next.tracks.get_mut(track_id) {
                track.data_request = Some(DataRequest {
                    start_sec: *start_sec,
                    end_sec: *end_sec,
                    resolution: *resolution,
                });
            }
        }

        Action::ClearTrackDataRequest { track_id } => {
            if let Some(track) = next.tracks.get_mut(track_id) {
                track.data_request = None;
            }
        }

        Action::ExecuteQuery {
            engine_id,
            query_id,
            text,
        } => {
            next.queries.insert(
                query_id.clone(),
                Query {
                    id: query_id.clone(),
                    engine_id: engine_id.clone(),
                    text: text.clone(),
                },
            );
        }

        Action::DeleteQuery { query_id } => {
            next.queries.remove(query_id);
        }

        Action::MoveTrack {
            track_id,
            direction,
        } => {
            move_track(&mut next, track_id, *direction)?;
        }

        Action::ToggleTrackPinned { track_id } => {
            toggle_track_pinned(&mut next, track_id)?;
        }

        Action::SetEngineReady { engine_id, ready } => match next.engines.get_mut(engine_id) {
            Some(engine) => engine.ready = *ready,
            None => return Err(ReduceError::UnknownEngine(engine_id.clone())),
        },

        Action::CreatePermalink { request_id } => {
            next.permalink = Some(Permalink {
                request_id: request_id.clone(),
                hash: None,
            });
        }

        Action::SetPermalink { request_id, hash } => {
            // Drop responses to superseded requests.
            match &mut next.permalink {
                Some(link) if link.request_id == *request_id => {
                    link.hash = Some(hash.clone());
                }
                _ => {}
            }
        }

        Action::LoadPermalink { request_id, hash } => {
            next.permalink = Some(Permalink {
                request_id: request_id.clone(),
                hash: Some(hash.clone()),
            });
        }

        Action::ReplaceState { state } => {
            next = (**state).clone();
        }

        Action::SetTraceTime {
            start_sec,
            end_sec,
            last_update_sec,
        } => {
            next.trace_time = TimeWindow {
                start_sec: *start_sec,
                end_sec: *end_sec,
                last_update_sec: *last_update_sec,
            };
        }

        Action::SetVisibleTraceTime {
            start_sec,
            end_sec,
            last_update_sec,
        } => {
            next.visible_trace_time = TimeWindow {
                start_sec: *start_sec,
                end_sec: *end_sec,
                last_update_sec: *last_update_sec,
            };
        }

        Action::UpdateStatus { msg, timestamp_sec } => {
            next.status = Status {
                msg: msg.clone(),
                timestamp_sec: *timestamp_sec,
            };
        }
    }
    Ok(next)
}

/// Moves `track_id` one slot up or down in the combined ordering.
///
/// Within a list the move is an adjacent-element swap. Across the
/// pinned/scrolling boundary the moved track itself relocates to the
/// adjacent-most slot on the other side (not a swap with the neighbor):
/// moving down past the last pinned slot demotes the track to the front of
/// scrolling, moving up past the first scrolling slot promotes it to the
/// end of pinned. Moves past the outer edges are no-ops.
fn move_track(next: &mut State, track_id: &str, direction: Direction) -> Result<(), ReduceError> {
    let pinned_idx = next.pinned_tracks.iter().position(|t| t == track_id);
    let scrolling_idx = next.scrolling_tracks.iter().position(|t| t == track_id);

    if let Some(i) = pinned_idx {
        let j = neighbor_index(i, direction);
        if j == next.pinned_tracks.len() as isize {
            // Only reachable with i == len - 1, so the popped id is the
            // moved track itself: demote it to the front of scrolling.
            if let Some(id) = next.pinned_tracks.pop() {
                next.scrolling_tracks.insert(0, id);
            }
        } else if j >= 0 && (j as usize) < next.pinned_tracks.len() {
            next.pinned_tracks.swap(i, j as usize);
        }
        // j == -1: moving up from the top of pinned, nothing above.
        Ok(())
    } else if let Some(i) = scrolling_idx {
        let j = neighbor_index(i, direction);
        if j == -1 {
            // Only reachable with i == 0: promote the track to the end
            // of pinned.
            let id = next.scrolling_tracks.remove(0);
            next.pinned_tracks.push(id);
        } else if (j as usize) < next.scrolling_tracks.len() {
            next.scrolling_tracks.swap(i, j as usize);
        }
        // j == len: moving down from the bottom of scrolling.
        Ok(())
    } else {
        Err(ReduceError::UnknownTrack(track_id.to_string()))
    }
}

fn neighbor_index(i: usize, direction: Direction) -> isize {
    match direction {
        Direction::Up => i as isize - 1,
        Direction::Down => i as isize + 1,
    }
}

/// Moves `track_id` to the boundary slot of the other ordering list:
/// pinning appends to the end of pinned, unpinning prepends to the front
/// of scrolling.
fn toggle_track_pinned(next: &mut State, track_id: &str) -> Result<(), ReduceError> {
    if let Some(i) = next.pinned_tracks.iter().position(|t| t == track_id) {
        let id = next.pinned_tracks.remove(i);
        next.scrolling_tracks.insert(0, id);
        Ok(())
    } else if let Some(i) = next.scrolling_tracks.iter().position(|t| t == track_id) {
        let id = next.scrolling_tracks.remove(i);
        next.pinned_tracks.push(id);
        Ok(())
    } else {
        Err(ReduceError::UnknownTrack(track_id.to_string()))
    }
}
