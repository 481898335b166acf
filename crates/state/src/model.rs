//! Holder of the current state value.

use crate::actions::Action;
use crate::reducer::{reduce, ReduceError};
use crate::types::State;

/// Owns the current [`State`] and is its only writer.
///
/// All mutation goes through [`Model::apply`], which delegates to the pure
/// reducer and replaces the held value. Not synchronized; the hub drives a
/// model from a single logical thread and hands out snapshots.
#[derive(Clone, Debug, Default)]
pub struct Model {
    state: State,
}

impl Model {
    /// Creates a model holding the canonical empty state.
    pub fn new() -> Self {
        Self {
            state: State::empty(),
        }
    }

    /// Creates a model holding `state`, for tests and hydration.
    pub fn with_state(state: State) -> Self {
        Self { state }
    }

    /// Read access to the current value.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Applies one action. On rejection the held value is unchanged.
    pub fn apply(&mut self, action: &Action) -> Result<(), ReduceError> {
        self.state = reduce(&self.state, action)?;
        Ok(())
    }
}
