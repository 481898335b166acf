//! Integration tests for the dispatch/quiescence loop.

use crossbeam_channel::{unbounded, Receiver};
use hub::{Controller, DispatchError, EngineHost, Hub};
use parking_lot::Mutex;
use state::{Action, State, TraceSource, TrackConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn make_hub(controller: Box<dyn Controller>) -> (Hub, Receiver<Arc<State>>) {
    let (tx, rx) = unbounded();
    let hub = Hub::builder()
        .controller(controller)
        .frontend(tx)
        .build()
        .expect("hub build");
    (hub, rx)
}

fn add_track(name: &str) -> Action {
    Action::AddTrack {
        engine_id: String::from("e1"),
        kind: String::from("Foo"),
        name: String::from(name),
        config: TrackConfig::new(),
    }
}

/// Controller stub that reports more work a fixed number of times.
struct CountingController {
    remaining: usize,
    invocations: Arc<AtomicUsize>,
}

impl Controller for CountingController {
    fn invoke(&mut self, _hub: &Hub) -> bool {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }
}

/// A controller that reports work `k` times drives exactly `k + 1` rounds
/// and exactly one published snapshot per external dispatch.
#[test]
fn quiescence_takes_k_plus_one_rounds_and_publishes_once() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (hub, rx) = make_hub(Box::new(CountingController {
        remaining: 3,
        invocations: Arc::clone(&invocations),
    }));

    hub.dispatch(Action::Navigate {
        route: String::from("/viewer"),
    })
    .expect("dispatch should reach quiescence");

    assert_eq!(invocations.load(Ordering::SeqCst), 4);
    assert_eq!(rx.try_iter().count(), 1, "exactly one snapshot per dispatch");
    assert_eq!(hub.published().route, "/viewer");
}

/// Controller that dispatches one action from inside its first invocation.
struct EnqueueOnceController {
    dispatched: bool,
    invocations: Arc<AtomicUsize>,
}

impl Controller for EnqueueOnceController {
    fn invoke(&mut self, hub: &Hub) -> bool {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.dispatched {
            self.dispatched = true;
            hub.dispatch(add_track("from controller"))
                .expect("re-entrant dispatch only enqueues");
        }
        false
    }
}

/// A dispatch from inside a controller is applied in the next round of the
/// same run, and the run still publishes a single snapshot.
#[test]
fn reentrant_dispatch_lands_in_next_round() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (hub, rx) = make_hub(Box::new(EnqueueOnceController {
        dispatched: false,
        invocations: Arc::clone(&invocations),
    }));

    hub.dispatch(Action::Navigate {
        route: String::from("/viewer"),
    })
    .expect("dispatch should reach quiescence");

    assert_eq!(
        invocations.load(Ordering::SeqCst),
        2,
        "the enqueued action forces one more round"
    );
    let snapshot = hub.published();
    assert_eq!(snapshot.tracks.len(), 1, "controller's action was applied");
    assert_eq!(rx.try_iter().count(), 1);
}

/// Controller stub that always reports more work.
struct LivelockedController;

impl Controller for LivelockedController {
    fn invoke(&mut self, _hub: &Hub) -> bool {
        true
    }
}

/// A controller that never settles trips the livelock bound instead of
/// hanging, and nothing is published.
#[test]
fn livelock_is_detected_instead_of_hanging() {
    let (tx, rx) = unbounded();
    let hub = Hub::builder()
        .controller(Box::new(LivelockedController))
        .frontend(tx)
        .max_rounds(5)
        .build()
        .expect("hub build");

    let err = hub
        .dispatch(Action::Navigate {
            route: String::from("/viewer"),
        })
        .expect_err("livelocked controllers must be detected");

    assert!(matches!(err, DispatchError::Livelock { .. }));
    assert_eq!(rx.try_iter().count(), 0, "no snapshot on a fatal condition");
}

/// Controller that records the state it observes on each invocation.
struct ObservingController {
    observed: Arc<Mutex<Vec<State>>>,
}

impl Controller for ObservingController {
    fn invoke(&mut self, hub: &Hub) -> bool {
        self.observed.lock().push(hub.state());
        false
    }
}

/// A whole batch is applied in submission order before the controller tree
/// observes the resulting state; no intermediate state is visible.
#[test]
fn batch_is_applied_before_controllers_observe() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let (hub, _rx) = make_hub(Box::new(ObservingController {
        observed: Arc::clone(&observed),
    }));

    hub.dispatch_multiple([
        add_track("T1"),
        add_track("T2"),
        Action::Navigate {
            route: String::from("/viewer"),
        },
    ])
    .expect("dispatch should reach quiescence");

    let observed = observed.lock();
    assert_eq!(observed.len(), 1);
    let state = &observed[0];
    assert_eq!(state.scrolling_tracks, vec!["0", "1"]);
    assert_eq!(state.route, "/viewer", "batch fully applied before invoke");
}

/// A rejected action is logged and skipped; the rest of the batch still
/// applies and the dispatch succeeds.
#[test]
fn rejected_action_does_not_abort_the_batch() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (hub, rx) = make_hub(Box::new(CountingController {
        remaining: 0,
        invocations: Arc::clone(&invocations),
    }));

    hub.dispatch_multiple([
        Action::ToggleTrackPinned {
            track_id: String::from("ghost"),
        },
        add_track("T1"),
    ])
    .expect("rejection of one action is not fatal");

    let snapshot = hub.published();
    assert_eq!(snapshot.tracks.len(), 1, "later actions still applied");
    assert_eq!(rx.try_iter().count(), 1);
}

/// The snapshot accessor and the frontend channel deliver the same value.
#[test]
fn published_accessor_matches_channel_snapshot() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (hub, rx) = make_hub(Box::new(CountingController {
        remaining: 0,
        invocations,
    }));

    hub.dispatch(add_track("T1")).expect("dispatch");

    let from_channel = rx.recv().expect("one snapshot on the channel");
    assert_eq!(*from_channel, *hub.published());
}

/// Engine host that records which engines it was asked to launch.
#[derive(Default)]
struct RecordingEngineHost {
    created: Mutex<Vec<String>>,
}

impl EngineHost for RecordingEngineHost {
    fn create_engine(&self, id: &str) -> anyhow::Result<()> {
        self.created.lock().push(String::from(id));
        Ok(())
    }

    fn destroy_engine(&self, _id: &str) {}
}

/// Minimal trace-load controller: launches backends for engines that are
/// not ready, simulates their readiness signal, and serves pending track
/// data requests once the engine is up.
struct TraceLoadController {
    launched: Vec<String>,
}

impl Controller for TraceLoadController {
    fn invoke(&mut self, hub: &Hub) -> bool {
        let state = hub.state();
        let mut produced = false;

        for engine in state.engines.values() {
            if !engine.ready && !self.launched.contains(&engine.id) {
                hub.engine_host()
                    .create_engine(&engine.id)
                    .expect("engine launch");
                self.launched.push(engine.id.clone());
                // The readiness signal would arrive async; deliver it as the
                // next round's action.
                hub.dispatch(Action::SetEngineReady {
                    engine_id: engine.id.clone(),
                    ready: true,
                })
                .expect("enqueue readiness");
                produced = true;
            }
        }

        for track in state.tracks.values() {
            let engine_ready = state
                .engines
                .get(&track.engine_id)
                .map(|e| e.ready)
                .unwrap_or(false);
            if engine_ready && track.data_request.is_some() {
                // Serving the request is out of scope; just retire it.
                hub.dispatch(Action::ClearTrackDataRequest {
                    track_id: track.id.clone(),
                })
                .expect("enqueue clear");
                produced = true;
            }
        }

        produced
    }
}

/// End-to-end: opening a trace launches an engine, the readiness action
/// unblocks the pending data request, and one consistent snapshot comes
/// out the far end.
#[test]
fn engine_readiness_unblocks_pending_data_request() {
    let host = Arc::new(RecordingEngineHost::default());
    let (tx, rx) = unbounded();
    let hub = Hub::builder()
        .controller(Box::new(TraceLoadController {
            launched: Vec::new(),
        }))
        .frontend(tx)
        .engines(Arc::clone(&host) as Arc<dyn EngineHost>)
        .build()
        .expect("hub build");

    hub.dispatch_multiple([
        Action::OpenTrace {
            source: TraceSource::Url(String::from("https://example.com/trace")),
        },
        Action::AddTrack {
            engine_id: String::from("0"),
            kind: String::from("CounterTrack"),
            name: String::from("T1"),
            config: TrackConfig::new(),
        },
        Action::RequestTrackData {
            track_id: String::from("1"),
            start_sec: 0.0,
            end_sec: 1.0,
            resolution: 0.01,
        },
    ])
    .expect("dispatch should reach quiescence");

    assert_eq!(*host.created.lock(), vec!["0"], "backend launched once");

    let snapshot = hub.published();
    assert!(snapshot.engines["0"].ready);
    assert!(
        snapshot.tracks["1"].data_request.is_none(),
        "request retired once the engine came up"
    );
    assert_eq!(
        rx.try_iter().count(),
        1,
        "intermediate rounds never reach the frontend"
    );
}

/// The builder refuses to assemble a hub without its collaborators.
#[test]
fn builder_requires_controller_and_frontend() {
    let err = Hub::builder().build().expect_err("missing collaborators");
    assert!(err.to_string().contains("missing root controller"));

    let err = Hub::builder()
        .controller(Box::new(LivelockedController))
        .build()
        .expect_err("missing frontend");
    assert!(err.to_string().contains("missing frontend channel"));
}
