use std::collections::VecDeque;
use tracing::debug;

use crate::config::{HarnessConfig, SameTickPolicy};
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub value: u32,
    /// Tick of the DRIVE phase that issued the write.
    pub tick: u64,
}

/// Software mirror of one hardware queue: first pushed, first compared.
#[derive(Debug, Clone)]
pub struct ExpectedQueue {
    name: String,
    capacity: usize,
    entries: VecDeque<Expected>,
}

impl ExpectedQueue {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Appends a value. A push into a full queue is refused with `Overflow`;
    /// the caller decides what a dropped write means.
    pub fn push(&mut self, value: u32, tick: u64) -> HarnessResult<()> {
        if self.is_full() {
            return Err(HarnessError::Overflow {
                queue: self.name.clone(),
                capacity: self.capacity,
            });
        }
        self.entries.push_back(Expected { value, tick });
        Ok(())
    }

    /// Removes and returns the oldest value.
    pub fn pop(&mut self) -> Option<Expected> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&Expected> {
        self.entries.front()
    }

    /// Entries a read on the edge of `tick` can see.
    pub fn visible_len(&self, tick: u64, policy: SameTickPolicy) -> usize {
        self.entries
            .iter()
            .filter(|e| match policy {
                SameTickPolicy::ReadFirst => e.tick < tick,
                SameTickPolicy::WriteFirst => e.tick <= tick,
            })
            .count()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn values(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.value).collect()
    }
}

/// Expected contents of every queue of the core, indexed like
/// `HarnessConfig::queues`.
#[derive(Debug, Clone)]
pub struct ReferenceModel {
    queues: Vec<ExpectedQueue>,
}

impl ReferenceModel {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            queues: config
                .queues
                .iter()
                .map(|q| ExpectedQueue::new(&q.name, q.capacity))
                .collect(),
        }
    }

    pub fn queue(&self, queue: usize) -> &ExpectedQueue {
        &self.queues[queue]
    }

    pub fn queues(&self) -> &[ExpectedQueue] {
        &self.queues
    }

    pub fn len(&self, queue: usize) -> usize {
        self.queues[queue].len()
    }

    pub fn is_full(&self, queue: usize) -> bool {
        self.queues[queue].is_full()
    }

    pub fn push(&mut self, queue: usize, value: u32, tick: u64) -> HarnessResult<()> {
        self.queues[queue].push(value, tick)
    }

    /// Removes the oldest value of `queue`, or `Underflow` if there is none.
    pub fn pop(&mut self, queue: usize, address: u32, observed: u32, tick: u64) -> HarnessResult<u32> {
        let q = &mut self.queues[queue];
        match q.pop() {
            Some(expected) => Ok(expected.value),
            None => Err(HarnessError::Underflow {
                queue: q.name.clone(),
                address,
                observed,
                tick,
            }),
        }
    }

    /// Hardware reset discards everything in flight.
    pub fn reset(&mut self) {
        for q in &mut self.queues {
            if !q.is_empty() {
                debug!(queue = %q.name, dropped = q.len(), "reference model reset");
            }
            q.reset();
        }
    }

    pub fn total_len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_push_order() {
        let mut q = ExpectedQueue::new("fifo", 4);
        for (i, v) in [0x12, 0x34, 0x56].into_iter().enumerate() {
            q.push(v, i as u64).unwrap();
        }
        let popped: Vec<u32> = std::iter::from_fn(|| q.pop().map(|e| e.value)).collect();
        assert_eq!(popped, vec![0x12, 0x34, 0x56]);
    }

    #[test]
    fn push_beyond_capacity_is_refused() {
        let mut q = ExpectedQueue::new("fifo", 2);
        q.push(1, 0).unwrap();
        q.push(2, 1).unwrap();
        assert!(matches!(q.push(3, 2), Err(HarnessError::Overflow { capacity: 2, .. })));
        assert_eq!(q.len(), 2);
        assert_eq!(q.values(), vec![1, 2]);
    }

    #[test]
    fn pop_on_empty_is_underflow() {
        let mut model = ReferenceModel::new(&HarnessConfig::default());
        let err = model.pop(0, 3, 0xaa, 7).unwrap_err();
        assert!(matches!(err, HarnessError::Underflow { observed: 0xaa, tick: 7, .. }));
    }

    #[test]
    fn same_tick_visibility_follows_policy() {
        let mut q = ExpectedQueue::new("fifo", 4);
        q.push(1, 3).unwrap();
        q.push(2, 5).unwrap();
        assert_eq!(q.visible_len(5, SameTickPolicy::ReadFirst), 1);
        assert_eq!(q.visible_len(5, SameTickPolicy::WriteFirst), 2);
    }

    #[test]
    fn reset_empties_every_queue() {
        let mut model = ReferenceModel::new(&HarnessConfig::default());
        model.push(0, 0xaa, 1).unwrap();
        model.reset();
        assert_eq!(model.total_len(), 0);
    }
}
