use futures_channel::mpsc::UnboundedSender;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::HarnessResult;
use crate::scheduler::SimContext;
use crate::shared::Shared;
use crate::sim_if::{InputPort, OutputPort};
use crate::transaction::Transaction;

/// Passive observer of the DUT ports. It never drives anything.
#[derive(Clone)]
pub struct Monitor {
    ctx: SimContext,
    last_reads: Shared<HashMap<u32, Transaction>>,
    observed: Shared<u64>,
    skipped: Shared<u64>,
}

impl Monitor {
    pub fn new(ctx: SimContext) -> Self {
        Self {
            ctx,
            last_reads: Shared::new(HashMap::new()),
            observed: Shared::new(0),
            skipped: Shared::new(0),
        }
    }

    /// Decodes this tick's ports. Must be called in SAMPLE. Empty when no
    /// enable was asserted or the sample had to be skipped because a port was
    /// unresolved. A write and a read in the same tick yield both, write first.
    pub fn observe(&self) -> HarnessResult<Vec<Transaction>> {
        match self.decode() {
            Ok(txs) => Ok(txs),
            Err(err) if !err.is_fatal() => {
                *self.skipped.get_mut() += 1;
                debug!(tick = self.ctx.tick(), error = %err, "sample skipped");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    fn decode(&self) -> HarnessResult<Vec<Transaction>> {
        let ctx = &self.ctx;
        let tick = ctx.tick();
        let input = |port: InputPort| -> HarnessResult<u32> { ctx.sample_input(port)?.to_u32(port.name()) };

        // Nothing is transacted while reset is held.
        if input(InputPort::ResetN)? == 0 {
            return Ok(Vec::new());
        }

        let mut txs = Vec::with_capacity(2);
        if input(InputPort::WriteEnable)? != 0 {
            txs.push(Transaction::write(
                input(InputPort::WriteAddress)?,
                input(InputPort::WriteData)?,
                tick,
            ));
        }
        if input(InputPort::ReadEnable)? != 0 {
            let address = input(InputPort::ReadAddress)?;
            let data = ctx.sample_output(OutputPort::ReadData)?.to_u32("read_data")?;
            let valid = match ctx.config().capabilities.has_read_valid {
                true => Some(ctx.sample_output(OutputPort::ReadValid)?.to_bool("read_valid")?),
                false => None,
            };
            txs.push(Transaction::read(address, data, tick, valid));
        }
        Ok(txs)
    }

    fn publish(&self, tx: &UnboundedSender<Transaction>, t: Transaction) {
        debug!(tick = t.tick, transaction = %t, "observed");
        *self.observed.get_mut() += 1;
        if t.is_read() {
            self.last_reads.get_mut().insert(t.address, t);
        }
        if tx.unbounded_send(t).is_err() {
            warn!(tick = t.tick, "scoreboard is gone, transaction dropped");
        }
    }

    /// Samples every tick, ahead of any other sampler, and publishes what it
    /// sees on `tx`.
    pub async fn run(self, tx: UnboundedSender<Transaction>) -> HarnessResult<()> {
        loop {
            self.ctx.next_sample_prio().await;
            for t in self.observe()? {
                self.publish(&tx, t);
            }
        }
    }

    /// Most recent read observed on `address`.
    pub fn last_read(&self, address: u32) -> Option<Transaction> {
        self.last_reads.get().get(&address).copied()
    }

    pub fn observed(&self) -> u64 {
        *self.observed.get()
    }

    /// Samples dropped because a port was unresolved.
    pub fn skipped(&self) -> u64 {
        *self.skipped.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::fifo_model::RegisterFifo;
    use crate::scheduler::ClockPhaseScheduler;
    use crate::sim_if::dut_handle;
    use crate::transaction::TxKind;
    use futures_channel::mpsc;
    use std::rc::Rc;

    #[test]
    fn unresolved_ports_skip_the_sample() {
        let config = Rc::new(HarnessConfig::default());
        let ctx = SimContext::new(dut_handle(RegisterFifo::new(&config)), config);
        let mut sched = ClockPhaseScheduler::new(ctx.clone());
        let monitor = Monitor::new(ctx);
        let (tx, mut rx) = mpsc::unbounded();
        sched.spawn("monitor", monitor.clone().run(tx));

        // Nothing was ever driven, so every input is still `x`.
        for _ in 0..3 {
            sched.advance_tick().unwrap();
        }
        assert_eq!(monitor.skipped(), 3);
        assert_eq!(monitor.observed(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn write_and_read_in_one_tick_are_both_published() {
        let config = Rc::new(HarnessConfig::default());
        let ctx = SimContext::new(dut_handle(RegisterFifo::new(&config)), config);
        let mut sched = ClockPhaseScheduler::new(ctx.clone());
        let monitor = Monitor::new(ctx.clone());
        let (tx, mut rx) = mpsc::unbounded();
        sched.spawn("monitor", monitor.clone().run(tx));
        let c = ctx.clone();
        let stim = sched.spawn("stimulus", async move {
            c.next_drive().await;
            for port in InputPort::ALL {
                c.drive(port, 0)?;
            }
            c.next_drive().await;
            c.drive(InputPort::ResetN, 1)?;
            c.drive(InputPort::WriteEnable, 1)?;
            c.drive(InputPort::WriteAddress, 4)?;
            c.drive(InputPort::WriteData, 0x42)?;
            c.drive(InputPort::ReadEnable, 1)?;
            c.drive(InputPort::ReadAddress, 3)?;
            Ok(())
        });
        sched.run_until_done(stim, 5).unwrap();

        let mut seen = Vec::new();
        while let Ok(t) = rx.try_recv() {
            seen.push(t.kind);
        }
        assert_eq!(seen, vec![TxKind::Write, TxKind::Read]);
        assert_eq!(monitor.last_read(3).map(|t| t.tick), Some(1));
    }
}
