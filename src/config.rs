//! Harness configuration.
//!
//! Everything the harness needs to know about the core under test is declared
//! here once, up front: port widths, the "no valid data" sentinel, which
//! optional outputs exist, and how addresses map onto queues. Components
//! consult this instead of probing the DUT at run time.

use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Optional outputs the DUT exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DutCapabilities {
    /// Per-queue `full` output port.
    pub has_full_flag: bool,
    /// Per-queue `empty` output port.
    pub has_empty_flag: bool,
    /// `read_valid` output qualifying `read_data`.
    pub has_read_valid: bool,
}

/// What a read sees when a write to the same queue lands on the same edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameTickPolicy {
    /// The read sees the queue as it was before the edge.
    #[default]
    ReadFirst,
    /// The write is visible to a read on the same edge.
    WriteFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    pub capacity: usize,
    #[serde(default)]
    pub write_addresses: Vec<u32>,
    #[serde(default)]
    pub read_addresses: Vec<u32>,
    #[serde(default)]
    pub not_empty_address: Option<u32>,
    #[serde(default)]
    pub not_full_address: Option<u32>,
}

impl QueueConfig {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            write_addresses: Vec::new(),
            read_addresses: Vec::new(),
            not_empty_address: None,
            not_full_address: None,
        }
    }
    pub fn write_at(mut self, address: u32) -> Self {
        self.write_addresses.push(address);
        self
    }
    pub fn read_at(mut self, address: u32) -> Self {
        self.read_addresses.push(address);
        self
    }
    pub fn status_at(mut self, not_empty: Option<u32>, not_full: Option<u32>) -> Self {
        self.not_empty_address = not_empty;
        self.not_full_address = not_full;
        self
    }
}

/// Meaning of a read address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterRole {
    /// Pops the queue's head.
    Data(usize),
    /// Reads 1 while the queue holds data.
    NotEmpty(usize),
    /// Reads 1 while the queue has room.
    NotFull(usize),
}

impl RegisterRole {
    pub fn queue(&self) -> usize {
        match *self {
            RegisterRole::Data(q) | RegisterRole::NotEmpty(q) | RegisterRole::NotFull(q) => q,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub address_width: u8,
    pub data_width: u8,
    /// Value `read_data` carries when a read finds its queue empty.
    pub sentinel: u32,
    pub capabilities: DutCapabilities,
    pub queues: Vec<QueueConfig>,
    /// Ticks `reset_n` is held low, then ticks waited after release.
    pub reset_low_ticks: u32,
    pub reset_recovery_ticks: u32,
    /// Transactions kept for mismatch diagnostics.
    pub history_depth: usize,
    /// Watchdog for a whole scenario.
    pub scenario_timeout_ticks: u64,
    /// Default bound for readiness waits.
    pub ready_timeout_ticks: u64,
    pub same_tick_policy: SameTickPolicy,
    pub seed: u64,
    /// Coverage percentage a session is expected to reach.
    pub coverage_goal: f64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            address_width: 3,
            data_width: 8,
            sentinel: 0,
            capabilities: DutCapabilities {
                has_full_flag: true,
                has_empty_flag: true,
                has_read_valid: false,
            },
            queues: vec![QueueConfig::new("fifo", 4)
                .write_at(4)
                .read_at(3)
                .status_at(Some(2), Some(0))],
            reset_low_ticks: 2,
            reset_recovery_ticks: 2,
            history_depth: 10,
            scenario_timeout_ticks: 10_000,
            ready_timeout_ticks: 64,
            same_tick_policy: SameTickPolicy::ReadFirst,
            seed: 0x5eed,
            coverage_goal: 100.0,
        }
    }
}

pub(crate) fn fits(value: u64, width: u8) -> bool {
    width >= 64 || value >> width == 0
}

impl HarnessConfig {
    pub fn from_json_str(json: &str) -> HarnessResult<Self> {
        let config: HarnessConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> HarnessResult<()> {
        for (what, width) in [("address_width", self.address_width), ("data_width", self.data_width)] {
            if width == 0 || width > 32 {
                return Err(HarnessError::Config(format!("{what} must be 1..=32, got {width}")));
            }
        }
        if !fits(self.sentinel as u64, self.data_width) {
            return Err(HarnessError::Config(format!(
                "sentinel {:#x} does not fit in {} data bits",
                self.sentinel, self.data_width
            )));
        }
        if self.queues.is_empty() {
            return Err(HarnessError::Config("at least one queue must be declared".into()));
        }
        if !(0.0..=100.0).contains(&self.coverage_goal) {
            return Err(HarnessError::Config(format!(
                "coverage_goal {} is not a percentage",
                self.coverage_goal
            )));
        }

        let mut write_owner: HashMap<u32, &str> = HashMap::new();
        let mut read_owner: HashMap<u32, &str> = HashMap::new();
        for queue in &self.queues {
            if queue.capacity == 0 {
                return Err(HarnessError::Config(format!("queue '{}' has zero capacity", queue.name)));
            }
            if self.queues.iter().filter(|q| q.name == queue.name).count() > 1 {
                return Err(HarnessError::Config(format!("queue name '{}' is used twice", queue.name)));
            }
            let reads = queue
                .read_addresses
                .iter()
                .chain(queue.not_empty_address.iter())
                .chain(queue.not_full_address.iter());
            for address in &queue.write_addresses {
                self.claim(&mut write_owner, *address, &queue.name)?;
            }
            for address in reads {
                self.claim(&mut read_owner, *address, &queue.name)?;
            }
        }
        Ok(())
    }

    fn claim<'a>(
        &self,
        owners: &mut HashMap<u32, &'a str>,
        address: u32,
        queue: &'a str,
    ) -> HarnessResult<()> {
        if !fits(address as u64, self.address_width) {
            return Err(HarnessError::Config(format!(
                "address {address:#x} of queue '{queue}' does not fit in {} bits",
                self.address_width
            )));
        }
        if let Some(other) = owners.insert(address, queue) {
            return Err(HarnessError::Config(format!(
                "address {address:#x} is mapped by both '{other}' and '{queue}'"
            )));
        }
        Ok(())
    }

    /// Queue a write to `address` lands in, if any.
    pub fn write_queue(&self, address: u32) -> Option<usize> {
        self.queues
            .iter()
            .position(|q| q.write_addresses.contains(&address))
    }

    pub fn read_role(&self, address: u32) -> Option<RegisterRole> {
        self.queues.iter().enumerate().find_map(|(i, q)| {
            if q.read_addresses.contains(&address) {
                Some(RegisterRole::Data(i))
            } else if q.not_empty_address == Some(address) {
                Some(RegisterRole::NotEmpty(i))
            } else if q.not_full_address == Some(address) {
                Some(RegisterRole::NotFull(i))
            } else {
                None
            }
        })
    }

    pub fn queue_index(&self, name: &str) -> Option<usize> {
        self.queues.iter().position(|q| q.name == name)
    }

    pub fn write_addresses(&self) -> Vec<u32> {
        let mut addrs: Vec<u32> = self
            .queues
            .iter()
            .flat_map(|q| q.write_addresses.iter().copied())
            .collect();
        addrs.sort_unstable();
        addrs
    }

    pub fn read_addresses(&self) -> Vec<u32> {
        let mut addrs: Vec<u32> = self
            .queues
            .iter()
            .flat_map(|q| {
                q.read_addresses
                    .iter()
                    .copied()
                    .chain(q.not_empty_address)
                    .chain(q.not_full_address)
            })
            .collect();
        addrs.sort_unstable();
        addrs
    }

    pub fn data_mask(&self) -> u32 {
        if self.data_width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.data_width) - 1
        }
    }
}
