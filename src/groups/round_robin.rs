//! Rotate events across targets

use crate::core::target::{close_all, flush_all, initialize_all};
use crate::core::{AsyncLogEvent, Result, Target, TargetRef};
use parking_lot::Mutex;
use std::time::Duration;

/// Sends each event to exactly one target, cycling through them in order
pub struct RoundRobinGroup {
    name: String,
    targets: Vec<TargetRef>,
    cursor: Mutex<usize>,
}

impl RoundRobinGroup {
    pub fn new(name: impl Into<String>, targets: Vec<TargetRef>) -> Self {
        Self {
            name: name.into(),
            targets,
            cursor: Mutex::new(0),
        }
    }

    pub fn targets(&self) -> &[TargetRef] {
        &self.targets
    }

    fn next_index(&self) -> usize {
        let mut cursor = self.cursor.lock();
        let index = *cursor;
        *cursor = (index + 1) % self.targets.len();
        index
    }
}

impl Target for RoundRobinGroup {
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
        let index = self.next_index();
        self.targets[index].write(event);
    }

    fn write_batch(&self, events: Vec<AsyncLogEvent>) {
        if self.targets.is_empty() {
            events.into_iter().for_each(|event| event.complete(None));
            return;
        }

        let mut per_target: Vec<Vec<AsyncLogEvent>> =
            self.targets.iter().map(|_| Vec::new()).collect();
        for event in events {
            per_target[self.next_index()].push(event);
        }
        for (target, batch) in self.targets.iter().zip(per_target) {
            if !batch.is_empty() {
                target.write_batch(batch);
            }
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        flush_all(&self.targets, timeout)
    }

    fn close(&self) {
        close_all(&self.targets);
    }
}
