//! Deterministic environment for tests and headless runs.

use tokio::sync::watch;

use crate::environment::{EnvironmentSignals, EnvironmentState};

/// An environment whose values never change.
#[derive(Debug)]
pub struct StaticEnvironment {
    tx: watch::Sender<EnvironmentState>,
}

impl StaticEnvironment {
    pub fn new(state: EnvironmentState) -> Self {
        let (tx, _) = watch::channel(state);
        Self { tx }
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self::new(EnvironmentState::default())
    }
}

impl EnvironmentSignals for StaticEnvironment {
    fn current(&self) -> EnvironmentState {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<EnvironmentState> {
        self.tx.subscribe()
    }
}
