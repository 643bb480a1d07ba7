use std::sync::Arc;

use hololith_store::Repository;

use crate::clock::{Clock, SystemClock};
use crate::engine::Engine;

/// Fluent builder for an [`Engine`].
///
/// The repository is mandatory; the clock defaults to [`SystemClock`].
pub struct EngineBuilder {
    repo: Arc<dyn Repository>,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo, clock: None }
    }

    /// Override the time source used for timestamps and analytics windows.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Wire every service over the shared repository and clock.
    pub fn build(self) -> Engine {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Engine::assemble(self.repo, clock)
    }
}
