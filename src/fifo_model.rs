//! Behavioral register-mapped queue core.
//!
//! `RegisterFifo` answers the [`SimIf`] boundary the way a synthesized core
//! behind a simulator would: inputs are `x` until driven, outputs are `x`
//! until the first edge with reset asserted, everything changes only on
//! `clock_edge`. A [`FaultPlan`] makes it misbehave on purpose so the failure
//! paths of the harness can be exercised.

use std::collections::{HashMap, VecDeque};
use tracing::trace;

use crate::config::{HarnessConfig, RegisterRole, SameTickPolicy};
use crate::sim_if::{InputPort, OutputPort, SimIf};
use crate::value::SignalValue;

/// Deliberate deviations from correct behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// XOR the n-th (0-based) value popped from any queue with the mask.
    pub corrupt_read: Option<(usize, u32)>,
    /// Status flags and registers always report "not ready".
    pub stuck_not_ready: bool,
    /// Reset does not clear the queues.
    pub ignore_reset: bool,
}

#[derive(Debug)]
pub struct RegisterFifo {
    config: HarnessConfig,
    faults: FaultPlan,
    inputs: HashMap<InputPort, u32>,
    queues: Vec<VecDeque<u32>>,
    // None until the first reset edge.
    read_data: Option<u32>,
    read_valid: Option<bool>,
    pops: usize,
    edges: u64,
}

impl RegisterFifo {
    pub fn new(config: &HarnessConfig) -> Self {
        Self::with_faults(config, FaultPlan::default())
    }

    pub fn with_faults(config: &HarnessConfig, faults: FaultPlan) -> Self {
        Self {
            config: config.clone(),
            faults,
            inputs: HashMap::new(),
            queues: config
                .queues
                .iter()
                .map(|q| VecDeque::with_capacity(q.capacity))
                .collect(),
            read_data: None,
            read_valid: None,
            pops: 0,
            edges: 0,
        }
    }

    pub fn queue_len(&self, queue: usize) -> usize {
        self.queues[queue].len()
    }

    pub fn contents(&self, queue: usize) -> Vec<u32> {
        self.queues[queue].iter().copied().collect()
    }

    pub fn edges(&self) -> u64 {
        self.edges
    }

    fn is_full(&self, queue: usize) -> bool {
        self.queues[queue].len() >= self.config.queues[queue].capacity
    }

    fn out_of_reset(&self) -> bool {
        self.read_data.is_some()
    }

    fn push(&mut self, queue: usize, data: u32) {
        if self.is_full(queue) {
            trace!(queue, data, "write dropped, queue full");
            return;
        }
        self.queues[queue].push_back(data & self.config.data_mask());
    }

    fn pop(&mut self, queue: usize) -> Option<u32> {
        let value = self.queues[queue].pop_front()?;
        let n = self.pops;
        self.pops += 1;
        match self.faults.corrupt_read {
            Some((at, mask)) if at == n => Some((value ^ mask) & self.config.data_mask()),
            _ => Some(value),
        }
    }

    fn register_read(&mut self, address: u32) -> (u32, bool) {
        let sentinel = self.config.sentinel;
        let stuck = self.faults.stuck_not_ready;
        match self.config.read_role(address) {
            Some(RegisterRole::Data(q)) => match self.pop(q) {
                Some(value) => (value, true),
                None => (sentinel, false),
            },
            Some(RegisterRole::NotEmpty(q)) => ((!stuck && !self.queues[q].is_empty()) as u32, true),
            Some(RegisterRole::NotFull(q)) => ((!stuck && !self.is_full(q)) as u32, true),
            None => (sentinel, false),
        }
    }

    fn input_width(&self, port: InputPort) -> u8 {
        match port {
            InputPort::WriteAddress | InputPort::ReadAddress => self.config.address_width,
            InputPort::WriteData => self.config.data_width,
            _ => 1,
        }
    }
}

impl SimIf for RegisterFifo {
    fn set_value(&mut self, port: InputPort, value: u32) {
        self.inputs.insert(port, value);
    }

    fn input_value(&self, port: InputPort) -> SignalValue {
        match self.inputs.get(&port) {
            Some(&v) => SignalValue::Int(v),
            None => SignalValue::unknown(self.input_width(port)),
        }
    }

    fn output_value(&self, port: OutputPort) -> SignalValue {
        let stuck = self.faults.stuck_not_ready;
        match port {
            OutputPort::ReadData => match self.read_data {
                Some(v) => SignalValue::Int(v),
                None => SignalValue::unknown(self.config.data_width),
            },
            OutputPort::ReadValid => match self.read_valid {
                Some(v) => v.into(),
                None => SignalValue::unknown(1),
            },
            OutputPort::Full(q) if self.out_of_reset() && q < self.queues.len() => {
                (stuck || self.is_full(q)).into()
            }
            OutputPort::Empty(q) if self.out_of_reset() && q < self.queues.len() => {
                (stuck || self.queues[q].is_empty()).into()
            }
            OutputPort::Full(_) | OutputPort::Empty(_) => SignalValue::unknown(1),
        }
    }

    fn clock_edge(&mut self) {
        self.edges += 1;
        let input = |port: InputPort| self.inputs.get(&port).copied();

        if input(InputPort::ResetN) == Some(0) {
            if !self.faults.ignore_reset || !self.out_of_reset() {
                for q in &mut self.queues {
                    q.clear();
                }
            }
            self.read_data = Some(self.config.sentinel);
            self.read_valid = Some(false);
            return;
        }
        if !self.out_of_reset() {
            return;
        }

        let write = match (input(InputPort::WriteEnable), input(InputPort::WriteAddress), input(InputPort::WriteData)) {
            (Some(1), Some(address), Some(data)) => self.config.write_queue(address).map(|q| (q, data)),
            _ => None,
        };
        let read = match (input(InputPort::ReadEnable), input(InputPort::ReadAddress)) {
            (Some(1), Some(address)) => Some(address),
            _ => None,
        };

        // Fullness is decided before the edge under either policy.
        let write = write.filter(|&(q, _)| !self.is_full(q));
        if self.config.same_tick_policy == SameTickPolicy::WriteFirst {
            if let Some((q, data)) = write {
                self.push(q, data);
            }
        }
        if let Some(address) = read {
            let (data, valid) = self.register_read(address);
            trace!(edge = self.edges, address, data, valid, "register read");
            self.read_data = Some(data);
            self.read_valid = Some(valid);
        } else {
            self.read_valid = Some(false);
        }
        if self.config.same_tick_policy == SameTickPolicy::ReadFirst {
            if let Some((q, data)) = write {
                self.push(q, data);
            }
        }
    }

    fn name(&self) -> &str {
        "register_fifo"
    }
}
