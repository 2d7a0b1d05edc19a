use futures::StreamExt;
use futures_channel::mpsc::UnboundedReceiver;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error};

use crate::config::{HarnessConfig, RegisterRole};
use crate::error::{HarnessError, HarnessResult};
use crate::reference::ReferenceModel;
use crate::shared::Shared;
use crate::transaction::{Transaction, TxKind};

/// Everything needed to diagnose a data divergence.
#[derive(Debug, Clone, PartialEq)]
pub struct MismatchRecord {
    pub queue: String,
    pub address: u32,
    pub expected: u32,
    pub observed: u32,
    pub tick: u64,
    /// Transactions observed before the failing read, oldest first.
    pub history: Vec<Transaction>,
}

impl fmt::Display for MismatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mismatch at tick {} on address {:#x} (queue '{}'): expected {:#x}, observed {:#x}",
            self.tick, self.address, self.queue, self.expected, self.observed
        )?;
        if !self.history.is_empty() {
            f.write_str("; history:")?;
            for t in &self.history {
                write!(f, " {t};")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreboardStats {
    pub writes: u32,
    /// Data register reads seen.
    pub received: u32,
    pub matched: u32,
    /// Reads that legitimately found their queue empty.
    pub empty_reads: u32,
    pub status_reads: u32,
    pub unmapped_reads: u32,
}

struct ScoreboardInner {
    model: Shared<ReferenceModel>,
    config: Rc<HarnessConfig>,
    history: VecDeque<Transaction>,
    stats: ScoreboardStats,
}

/// Correctness oracle. Consumes observed transactions and checks every data
/// read against the reference model.
///
/// The first divergence is fatal: once a read is compared against the wrong
/// expected value the queue ordering is out of step and later comparisons
/// mean nothing.
#[derive(Clone)]
pub struct Scoreboard(Shared<ScoreboardInner>);

impl Scoreboard {
    pub fn new(model: Shared<ReferenceModel>, config: Rc<HarnessConfig>) -> Self {
        let depth = config.history_depth;
        Self(Shared::new(ScoreboardInner {
            model,
            config,
            history: VecDeque::with_capacity(depth),
            stats: ScoreboardStats::default(),
        }))
    }

    pub fn on_observed(&self, t: Transaction) -> HarnessResult<()> {
        let mut inner = self.0.get_mut();
        let result = match t.kind {
            TxKind::Write => {
                inner.stats.writes += 1;
                Ok(())
            }
            TxKind::Read => inner.check_read(&t),
        };
        inner.remember(t);
        result
    }

    /// Consumes transactions until the channel closes or a check fails.
    pub async fn run(self, mut rx: UnboundedReceiver<Transaction>) -> HarnessResult<()> {
        while let Some(t) = rx.next().await {
            self.on_observed(t)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> ScoreboardStats {
        self.0.get().stats
    }

    pub fn history(&self) -> Vec<Transaction> {
        self.0.get().history.iter().copied().collect()
    }

    pub fn result_str(&self) -> String {
        let s = self.stats();
        format!(
            "writes={}, received={}, matched={}, empty_reads={}, status_reads={}, unmapped_reads={}",
            s.writes, s.received, s.matched, s.empty_reads, s.status_reads, s.unmapped_reads
        )
    }
}

impl ScoreboardInner {
    fn remember(&mut self, t: Transaction) {
        if self.config.history_depth == 0 {
            return;
        }
        if self.history.len() == self.config.history_depth {
            self.history.pop_front();
        }
        self.history.push_back(t);
    }

    fn check_read(&mut self, t: &Transaction) -> HarnessResult<()> {
        let queue = match self.config.read_role(t.address) {
            Some(RegisterRole::Data(q)) => q,
            Some(RegisterRole::NotEmpty(_) | RegisterRole::NotFull(_)) => {
                self.stats.status_reads += 1;
                return Ok(());
            }
            None => {
                self.stats.unmapped_reads += 1;
                return Ok(());
            }
        };
        self.stats.received += 1;

        let mut model = self.model.get_mut();
        let visible = model
            .queue(queue)
            .visible_len(t.tick, self.config.same_tick_policy);
        // Without a read_valid output, the sentinel from a queue the model
        // also believes empty is a legal empty read.
        let valid = t.valid.unwrap_or(visible > 0 || t.data != self.config.sentinel);
        if !valid {
            self.stats.empty_reads += 1;
            debug!(tick = t.tick, address = t.address, "empty read");
            return Ok(());
        }
        if visible == 0 {
            error!(tick = t.tick, address = t.address, data = t.data, "read with no expected write");
            return Err(HarnessError::Underflow {
                queue: model.queue(queue).name().to_string(),
                address: t.address,
                observed: t.data,
                tick: t.tick,
            });
        }

        let expected = model.pop(queue, t.address, t.data, t.tick)?;
        if expected != t.data {
            let record = MismatchRecord {
                queue: model.queue(queue).name().to_string(),
                address: t.address,
                expected,
                observed: t.data,
                tick: t.tick,
                history: self.history.iter().copied().collect(),
            };
            error!(%record, "scoreboard mismatch");
            return Err(HarnessError::Mismatch(Box::new(record)));
        }
        self.stats.matched += 1;
        debug!(tick = t.tick, address = t.address, data = t.data, "read matched");
        Ok(())
    }
}
