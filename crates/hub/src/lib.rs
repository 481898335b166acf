//! Dispatch loop driving controllers to quiescence.
//!
//! The [`Hub`] is the single entry point for state changes: collaborators
//! submit [`Action`] batches through [`Hub::dispatch`] /
//! [`Hub::dispatch_multiple`], the hub applies them to the model and runs
//! the controller tree until no further work is produced, then publishes
//! exactly one state snapshot to the presentation boundary. The
//! presentation layer therefore never observes a state that existed
//! mid-batch.

use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use smallvec::SmallVec;
use state::{Action, Model, State};
use std::fmt;
use std::mem;
use std::sync::Arc;
use thiserror::Error;

/// Iteration bound for one dispatch call. Exceeding it means two
/// controllers are perpetually re-triggering each other.
pub const DEFAULT_MAX_ROUNDS: usize = 100;

/// Fatal dispatch-loop conditions. These indicate a broken invariant in
/// calling code, not bad input; no snapshot is published when one occurs.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The controller tree kept producing work past the round bound.
    #[error("controllers are stuck in a livelock ({rounds} rounds)")]
    Livelock { rounds: usize },
    /// The loop was entered while a controller invocation was already
    /// active on this hub.
    #[error("re-entrant controller run detected")]
    ReentrantRun,
}

/// One node of reactive logic driven by the hub.
///
/// `invoke` inspects the current state through the hub and may dispatch
/// further actions (re-entrant dispatch only enqueues; the new actions are
/// applied in the next round). Returning `true` means "I produced or still
/// expect further asynchronous actions; run me again after the current
/// queue drains."
pub trait Controller: Send {
    fn invoke(&mut self, hub: &Hub) -> bool;
}

/// Spawns and tears down trace-processing engine backends.
///
/// Opaque to the core: the state only tracks the resulting engine entity
/// and its readiness flag, fed back as `SetEngineReady` actions.
pub trait EngineHost: Send + Sync {
    /// Launches a backend instance for the engine registered under `id`.
    fn create_engine(&self, id: &str) -> Result<()>;
    /// Tears down the backend instance for `id`.
    fn destroy_engine(&self, id: &str);
}

/// Host that backs no engines, for headless use and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEngineHost;

impl EngineHost for NullEngineHost {
    fn create_engine(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    fn destroy_engine(&self, _id: &str) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
}

struct Queue {
    pending: SmallVec<[Action; 8]>,
    phase: Phase,
}

struct HubInner {
    model: Mutex<Model>,
    queue: Mutex<Queue>,
    controller: Mutex<Box<dyn Controller>>,
    engines: Arc<dyn EngineHost>,
    frontend: Sender<Arc<State>>,
    published: ArcSwap<State>,
    max_rounds: usize,
}

/// Cheap-clone handle to the dispatch loop and the model it drives.
///
/// Controllers and async completion handlers hold clones and dispatch
/// through them; a dispatch that arrives while a run is in progress is
/// enqueued for the next round, never interleaved into the current one.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub").finish_non_exhaustive()
    }
}

impl Hub {
    pub fn builder() -> HubBuilder {
        HubBuilder::new()
    }

    /// Submits one action. See [`Hub::dispatch_multiple`].
    pub fn dispatch(&self, action: Action) -> std::result::Result<(), DispatchError> {
        self.dispatch_multiple([action])
    }

    /// Submits a batch of actions in order.
    ///
    /// If the hub is idle this call runs the controller loop to quiescence
    /// and publishes one snapshot before returning. If a run is already in
    /// progress the batch is enqueued for that run's next round and the
    /// call returns immediately.
    pub fn dispatch_multiple<I>(&self, actions: I) -> std::result::Result<(), DispatchError>
    where
        I: IntoIterator<Item = Action>,
    {
        {
            let mut queue = self.inner.queue.lock();
            queue.pending.extend(actions);
            if queue.phase == Phase::Running {
                return Ok(());
            }
            queue.phase = Phase::Running;
        }

        let result = self.run_controllers();
        self.inner.queue.lock().phase = Phase::Idle;
        result
    }

    /// Runs controllers until the pending queue stays empty and the tree
    /// reports no further expected work, then publishes one snapshot.
    fn run_controllers(&self) -> std::result::Result<(), DispatchError> {
        // A held controller lock means an invocation is already active and
        // something inside it re-entered the loop. Fail fast rather than
        // deadlocking or corrupting action ordering.
        let mut controller = self
            .inner
            .controller
            .try_lock()
            .ok_or(DispatchError::ReentrantRun)?;

        let mut run_again = false;
        let mut rounds = 0usize;
        loop {
            let batch = {
                let mut queue = self.inner.queue.lock();
                mem::take(&mut queue.pending)
            };
            if batch.is_empty() && !run_again {
                break;
            }

            rounds += 1;
            if rounds > self.inner.max_rounds {
                return Err(DispatchError::Livelock { rounds });
            }

            {
                let mut model = self.inner.model.lock();
                for action in &batch {
                    log::debug!("applying action {action:?}");
                    if let Err(err) = model.apply(action) {
                        // Rejections indicate caller/UI desync, not a broken
                        // loop; the batch keeps going.
                        log::warn!("action rejected: {err}");
                    }
                }
            }

            run_again = controller.invoke(self);
        }
        log::debug!("controllers reached quiescence after {rounds} round(s)");

        let snapshot = Arc::new(self.inner.model.lock().state().clone());
        self.inner.published.store(Arc::clone(&snapshot));
        if self.inner.frontend.send(snapshot).is_err() {
            log::warn!("presentation boundary disconnected; snapshot dropped");
        }
        Ok(())
    }

    /// Clone of the live model state. Controllers read through this during
    /// a run; between runs it equals the last published snapshot.
    pub fn state(&self) -> State {
        self.inner.model.lock().state().clone()
    }

    /// Last published snapshot. Immutable once published, so it is safe to
    /// share across threads.
    pub fn published(&self) -> Arc<State> {
        self.inner.published.load_full()
    }

    /// Engine lifecycle host configured for this hub.
    pub fn engine_host(&self) -> &dyn EngineHost {
        &*self.inner.engines
    }
}

/// Assembles a [`Hub`] from its collaborators.
pub struct HubBuilder {
    controller: Option<Box<dyn Controller>>,
    frontend: Option<Sender<Arc<State>>>,
    engines: Arc<dyn EngineHost>,
    initial: State,
    max_rounds: usize,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self {
            controller: None,
            frontend: None,
            engines: Arc::new(NullEngineHost),
            initial: State::empty(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Root of the controller tree.
    pub fn controller(mut self, controller: Box<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Channel on which quiescent snapshots are published.
    pub fn frontend(mut self, frontend: Sender<Arc<State>>) -> Self {
        self.frontend = Some(frontend);
        self
    }

    /// Engine lifecycle host. Defaults to [`NullEngineHost`].
    pub fn engines(mut self, engines: Arc<dyn EngineHost>) -> Self {
        self.engines = engines;
        self
    }

    /// Initial state, for tests and hydration. Defaults to empty.
    pub fn initial_state(mut self, state: State) -> Self {
        self.initial = state;
        self
    }

    /// Livelock bound override. Defaults to [`DEFAULT_MAX_ROUNDS`].
    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn build(self) -> Result<Hub> {
        let controller = self
            .controller
            .ok_or_else(|| anyhow!("missing root controller"))?;
        let frontend = self
            .frontend
            .ok_or_else(|| anyhow!("missing frontend channel"))?;
        let published = ArcSwap::from_pointee(self.initial.clone());
        Ok(Hub {
            inner: Arc::new(HubInner {
                model: Mutex::new(Model::with_state(self.initial)),
                queue: Mutex::new(Queue {
                    pending: SmallVec::new(),
                    phase: Phase::Idle,
                }),
                controller: Mutex::new(controller),
                engines: self.engines,
                frontend,
                published,
                max_rounds: self.max_rounds,
            }),
        })
    }
}

impl Default for HubBuilder {
    fn default() -> Self {
        Self::new()
    }
}
