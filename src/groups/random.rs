//! Spread events across targets at random

use crate::core::target::{close_all, flush_all, initialize_all};
use crate::core::{AsyncLogEvent, Result, Target, TargetRef};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Sends each event to one uniformly chosen target
pub struct RandomGroup {
    name: String,
    targets: Vec<TargetRef>,
    rng: Mutex<StdRng>,
}

impl RandomGroup {
    pub fn new(name: impl Into<String>, targets: Vec<TargetRef>) -> Self {
        Self::with_rng(name, targets, StdRng::from_entropy())
    }

    /// Deterministic selection sequence
    pub fn with_seed(name: impl Into<String>, targets: Vec<TargetRef>, seed: u64) -> Self {
        Self::with_rng(name, targets, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, targets: Vec<TargetRef>, rng: StdRng) -> Self {
        Self {
            name: name.into(),
            targets,
            rng: Mutex::new(rng),
        }
    }

    pub fn targets(&self) -> &[TargetRef] {
        &self.targets
    }

    fn pick(&self) -> usize {
        self.rng.lock().gen_range(0..self.targets.len())
    }
}

impl Target for RandomGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<()> {
        initialize_all(&self.targets)
    }

    fn write(&self, event: AsyncLogEvent) {
        if self.targets.is_empty() {
            event.complete(None);
            return;
        }
        self.targets[self.pick()].write(event);
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        flush_all(&self.targets, timeout)
    }

    fn close(&self) {
        close_all(&self.targets);
    }
}
