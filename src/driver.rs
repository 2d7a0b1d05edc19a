use tracing::{debug, info, warn};

use crate::config::fits;
use crate::coverage::{CoverageTracker, WRITE_WHEN_FULL};
use crate::error::{HarnessError, HarnessResult};
use crate::reference::ReferenceModel;
use crate::scheduler::SimContext;
use crate::shared::Shared;
use crate::sim_if::InputPort;
use crate::trigger::Phase;

/// Turns requested operations into port assignments.
///
/// Every operation waits for a DRIVE phase, applies all of its assignments
/// without suspending in between, then waits for the following DRIVE phase
/// and deasserts the enables. It returns while that second DRIVE phase is
/// still open, so a follow-up operation lands on the very same tick and the
/// bus carries one operation per tick.
#[derive(Clone)]
pub struct Driver {
    ctx: SimContext,
    model: Shared<ReferenceModel>,
    coverage: Shared<CoverageTracker>,
    // Tick whose DRIVE phase already carries an operation.
    claimed: Shared<Option<u64>>,
}

impl Driver {
    pub fn new(ctx: SimContext, model: Shared<ReferenceModel>, coverage: Shared<CoverageTracker>) -> Self {
        Self {
            ctx,
            model,
            coverage,
            claimed: Shared::new(None),
        }
    }

    /// Resolves in a DRIVE phase no other operation has used yet and marks
    /// it as used. Returns its tick.
    async fn claim_drive(&self) -> u64 {
        let free = self.ctx.phase() == Phase::Drive && *self.claimed.get() != Some(self.ctx.tick());
        if !free {
            self.ctx.next_drive().await;
        }
        let tick = self.ctx.tick();
        *self.claimed.get_mut() = Some(tick);
        tick
    }

    async fn release_enables(&self) -> HarnessResult<()> {
        self.ctx.next_drive().await;
        self.ctx.drive(InputPort::WriteEnable, 0)?;
        self.ctx.drive(InputPort::ReadEnable, 0)
    }

    fn check(&self, what: &'static str, value: u32) -> HarnessResult<()> {
        let config = self.ctx.config();
        let width = match what {
            "write_data" => config.data_width,
            _ => config.address_width,
        };
        if !fits(value as u64, width) {
            return Err(HarnessError::OutOfRange {
                what,
                value: value as u64,
                width,
            });
        }
        Ok(())
    }

    /// Deasserts every control input, releases reset and waits one tick.
    pub async fn initialize(&self) -> HarnessResult<()> {
        let tick = self.claim_drive().await;
        for port in InputPort::ALL {
            self.ctx.drive(port, (port == InputPort::ResetN) as u32)?;
        }
        debug!(tick, "inputs initialized");
        self.ctx.next_drive().await;
        Ok(())
    }

    /// Applies a write and mirrors it in the reference model. Must be called
    /// in DRIVE; returns false when the target queue was already full.
    fn apply_write(&self, address: u32, data: u32, tick: u64) -> HarnessResult<bool> {
        self.ctx.drive(InputPort::WriteAddress, address)?;
        self.ctx.drive(InputPort::WriteData, data)?;
        self.ctx.drive(InputPort::WriteEnable, 1)?;

        let Some(queue) = self.ctx.config().write_queue(address) else {
            warn!(tick, address, "write to an unmapped address");
            return Ok(true);
        };
        let mut model = self.model.get_mut();
        if model.is_full(queue) {
            warn!(tick, address, data, queue = model.queue(queue).name(), "write attempted while full");
            self.coverage.get_mut().hit(WRITE_WHEN_FULL)?;
            return Ok(false);
        }
        model.push(queue, data, tick)?;
        debug!(tick, address, data, "write");
        Ok(true)
    }

    fn apply_read(&self, address: u32, tick: u64) -> HarnessResult<()> {
        self.ctx.drive(InputPort::ReadAddress, address)?;
        self.ctx.drive(InputPort::ReadEnable, 1)?;
        debug!(tick, address, "read");
        Ok(())
    }

    /// Pulses a write. Returns the tick it was driven in.
    pub async fn write(&self, address: u32, data: u32) -> HarnessResult<u64> {
        self.check("write_address", address)?;
        self.check("write_data", data)?;
        let tick = self.claim_drive().await;
        self.ctx.drive(InputPort::ReadEnable, 0)?;
        self.apply_write(address, data, tick)?;
        self.release_enables().await?;
        Ok(tick)
    }

    /// Pulses a read. The data surfaces through the monitor in the SAMPLE
    /// phase of the returned tick.
    pub async fn read(&self, address: u32) -> HarnessResult<u64> {
        self.check("read_address", address)?;
        let tick = self.claim_drive().await;
        self.ctx.drive(InputPort::WriteEnable, 0)?;
        self.apply_read(address, tick)?;
        self.release_enables().await?;
        Ok(tick)
    }

    /// A write and a read on the same edge.
    pub async fn write_and_read(&self, write_address: u32, data: u32, read_address: u32) -> HarnessResult<u64> {
        self.check("write_address", write_address)?;
        self.check("write_data", data)?;
        self.check("read_address", read_address)?;
        let tick = self.claim_drive().await;
        self.apply_write(write_address, data, tick)?;
        self.apply_read(read_address, tick)?;
        self.release_enables().await?;
        Ok(tick)
    }

    /// Holds write enable high for one tick per value, then drops it.
    pub async fn write_held(&self, address: u32, values: &[u32]) -> HarnessResult<u64> {
        self.check("write_address", address)?;
        for &data in values {
            self.check("write_data", data)?;
        }
        let mut first = None;
        for &data in values {
            let tick = self.claim_drive().await;
            first.get_or_insert(tick);
            self.ctx.drive(InputPort::ReadEnable, 0)?;
            self.apply_write(address, data, tick)?;
        }
        match first {
            Some(tick) => {
                self.release_enables().await?;
                Ok(tick)
            }
            None => Ok(self.ctx.tick()),
        }
    }

    /// Holds `reset_n` low for `low_ticks` ticks (at least one), releases it
    /// and waits `recovery_ticks` more. The reference model is cleared in the
    /// tick reset is asserted, since the hardware drops everything in flight.
    pub async fn drive_reset(&self, low_ticks: u32, recovery_ticks: u32) -> HarnessResult<()> {
        let tick = self.claim_drive().await;
        self.ctx.drive(InputPort::WriteEnable, 0)?;
        self.ctx.drive(InputPort::ReadEnable, 0)?;
        self.ctx.drive(InputPort::ResetN, 0)?;
        self.model.get_mut().reset();
        info!(tick, low_ticks, "reset asserted");

        self.ctx.clock_cycles(low_ticks.max(1)).await;
        self.ctx.drive(InputPort::ResetN, 1)?;
        *self.claimed.get_mut() = Some(self.ctx.tick());
        debug!(tick = self.ctx.tick(), "reset released");

        self.ctx.clock_cycles(recovery_ticks).await;
        Ok(())
    }
}
