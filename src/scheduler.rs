//! Clock and phase scheduling.
//!
//! Simulated time advances in ticks. Each tick is DRIVE, then SETTLE, then
//! SAMPLE. Components never wait on the raw clock; they await the phase
//! triggers handed out by [`SimContext`], and the [`ClockPhaseScheduler`]
//! runs every task woken for a phase to its next suspension point before the
//! next phase begins. That gives a total order per tick:
//!
//! 1. DRIVE: everything driven this tick is applied.
//! 2. SETTLE: the pre-edge [`SignalSnapshot`] is captured, then the DUT sees
//!    one active clock edge.
//! 3. SAMPLE: the monitor observes first, then other samplers; transactions
//!    it publishes are consumed before the next DRIVE starts.

use num_format::{Locale, ToFormattedString};
use std::future::Future;
use std::rc::Rc;
use tracing::{debug, error, trace};

use crate::config::{HarnessConfig, SameTickPolicy};
use crate::error::{HarnessError, HarnessResult};
use crate::executor::{Executor, TaskId};
use crate::reference::ReferenceModel;
use crate::shared::Shared;
use crate::sim_if::{DutHandle, InputPort, OutputPort, SimIf};
use crate::trigger::{Phase, PhaseState, TrigKind, Trigger};
use crate::value::SignalValue;

/// Status flags of one queue. A flag the DUT lacks is derived from the
/// occupancy of the attached reference model before the edge, and is `None`
/// when no model is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFlags {
    pub full: Option<bool>,
    pub empty: Option<bool>,
}

/// Port values as the DUT saw them at the active edge of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub tick: u64,
    pub write_enable: bool,
    pub write_address: u32,
    pub write_data: u32,
    pub read_enable: bool,
    pub read_address: u32,
    pub reset_active: bool,
    /// Queue targeted by the write / read address, if mapped.
    pub write_queue: Option<usize>,
    pub read_queue: Option<usize>,
    pub flags: Vec<QueueFlags>,
}

impl SignalSnapshot {
    /// Reads every port the coverage model cares about. Fails with
    /// `UndefinedSignal` if any of them is unresolved.
    pub fn capture(
        dut: &dyn SimIf,
        config: &HarnessConfig,
        model: Option<&ReferenceModel>,
        tick: u64,
    ) -> HarnessResult<Self> {
        let input = |port: InputPort| dut.input_value(port).to_u32(port.name());
        let flag = |port: OutputPort| -> HarnessResult<Option<bool>> {
            Ok(Some(dut.output_value(port).to_bool(&port.to_string())?))
        };

        let write_address = input(InputPort::WriteAddress)?;
        let read_address = input(InputPort::ReadAddress)?;
        // Entries pushed in this tick's DRIVE are not in the DUT yet.
        let occupancy = |q: usize| {
            model.map(|m| {
                let queue = m.queue(q);
                (queue.visible_len(tick, SameTickPolicy::ReadFirst), queue.capacity())
            })
        };
        let caps = config.capabilities;
        let flags = (0..config.queues.len())
            .map(|q| {
                let full = match caps.has_full_flag {
                    true => flag(OutputPort::Full(q))?,
                    false => occupancy(q).map(|(len, capacity)| len >= capacity),
                };
                let empty = match caps.has_empty_flag {
                    true => flag(OutputPort::Empty(q))?,
                    false => occupancy(q).map(|(len, _)| len == 0),
                };
                Ok(QueueFlags { full, empty })
            })
            .collect::<HarnessResult<Vec<_>>>()?;

        Ok(SignalSnapshot {
            tick,
            write_enable: input(InputPort::WriteEnable)? != 0,
            write_address,
            write_data: input(InputPort::WriteData)?,
            read_enable: input(InputPort::ReadEnable)? != 0,
            read_address,
            reset_active: input(InputPort::ResetN)? == 0,
            write_queue: config.write_queue(write_address),
            read_queue: config.read_role(read_address).map(|r| r.queue()),
            flags,
        })
    }

    pub fn write_flags(&self) -> QueueFlags {
        self.write_queue
            .and_then(|q| self.flags.get(q).copied())
            .unwrap_or_default()
    }

    pub fn read_flags(&self) -> QueueFlags {
        self.read_queue
            .and_then(|q| self.flags.get(q).copied())
            .unwrap_or_default()
    }

    pub fn any_full(&self) -> bool {
        self.flags.iter().any(|f| f.full == Some(true))
    }

    pub fn any_empty(&self) -> bool {
        self.flags.iter().any(|f| f.empty == Some(true))
    }
}

/// Handle every component uses to wait for phases and touch the DUT.
#[derive(Clone)]
pub struct SimContext {
    state: Shared<PhaseState>,
    dut: DutHandle,
    config: Rc<HarnessConfig>,
    model: Shared<Option<Shared<ReferenceModel>>>,
}

impl SimContext {
    pub fn new(dut: DutHandle, config: Rc<HarnessConfig>) -> Self {
        Self {
            state: Shared::new(PhaseState::new()),
            dut,
            config,
            model: Shared::new(None),
        }
    }

    /// Lets snapshots stand in for missing full/empty flags with the
    /// model's occupancy.
    pub fn attach_model(&self, model: Shared<ReferenceModel>) {
        *self.model.get_mut() = Some(model);
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Rc<HarnessConfig> {
        self.config.clone()
    }

    pub fn tick(&self) -> u64 {
        self.state.get().tick
    }

    pub fn phase(&self) -> Phase {
        self.state.get().phase
    }

    pub fn next_drive(&self) -> Trigger {
        Trigger::new(self.state.clone(), TrigKind::Drive, false)
    }

    pub fn next_sample(&self) -> Trigger {
        Trigger::new(self.state.clone(), TrigKind::Sample, false)
    }

    pub(crate) fn next_sample_prio(&self) -> Trigger {
        Trigger::new(self.state.clone(), TrigKind::Sample, true)
    }

    /// Returns in the SAMPLE phase of a tick whose DRIVE phase happened after
    /// the call, i.e. after one complete DRIVE, SETTLE, SAMPLE cycle.
    pub async fn advance_tick(&self) {
        self.next_drive().await;
        self.next_sample().await;
    }

    /// Waits for `n` DRIVE phases.
    pub async fn clock_cycles(&self, n: u32) {
        for _ in 0..n {
            self.next_drive().await;
        }
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> HarnessResult<()> {
        let state = self.state.get();
        if state.phase != expected {
            return Err(HarnessError::PhaseViolation {
                action,
                actual: state.phase,
                tick: state.tick,
            });
        }
        Ok(())
    }

    /// Assigns an input port. Only legal during DRIVE.
    pub fn drive(&self, port: InputPort, value: u32) -> HarnessResult<()> {
        self.expect_phase(Phase::Drive, "drive")?;
        trace!(tick = self.tick(), %port, value, "drive");
        self.dut.get_mut().set_value(port, value);
        Ok(())
    }

    /// Reads back an input port. Only legal during SAMPLE.
    pub fn sample_input(&self, port: InputPort) -> HarnessResult<SignalValue> {
        self.expect_phase(Phase::Sample, "sample")?;
        Ok(self.dut.get().input_value(port))
    }

    /// Reads an output port. Only legal during SAMPLE.
    pub fn sample_output(&self, port: OutputPort) -> HarnessResult<SignalValue> {
        self.expect_phase(Phase::Sample, "sample")?;
        Ok(self.dut.get().output_value(port))
    }

    /// Snapshot taken at this tick's edge. `None` outside SAMPLE or when a
    /// port was unresolved.
    pub fn snapshot(&self) -> Option<SignalSnapshot> {
        let state = self.state.get();
        match state.phase {
            Phase::Sample => state.snapshot.clone(),
            _ => None,
        }
    }

    /// Evaluates `ready` in the SAMPLE phase of each following tick until it
    /// holds, for at most `max_ticks` ticks. Unresolved signals count as "not
    /// yet". Returns the tick the condition held in.
    pub async fn wait_until(
        &self,
        condition: &str,
        max_ticks: u64,
        mut ready: impl FnMut() -> HarnessResult<bool>,
    ) -> HarnessResult<u64> {
        for _ in 0..max_ticks {
            self.next_sample().await;
            match ready() {
                Ok(true) => return Ok(self.tick()),
                Ok(false) => {}
                Err(err) if !err.is_fatal() => {
                    debug!(tick = self.tick(), condition, error = %err, "skipping unresolved sample");
                }
                Err(err) => return Err(err),
            }
        }
        Err(HarnessError::Timeout {
            condition: condition.to_string(),
            max_ticks,
            tick: self.tick(),
        })
    }
}

/// Produces ticks and runs the tasks woken in each phase.
///
/// A task failing in any phase halts the clock: the error is returned from
/// that tick and every later call to [`advance_tick`](Self::advance_tick).
pub struct ClockPhaseScheduler {
    ctx: SimContext,
    executor: Executor,
    halted: Option<HarnessError>,
}

impl ClockPhaseScheduler {
    pub fn new(ctx: SimContext) -> Self {
        Self {
            ctx,
            executor: Executor::new(),
            halted: None,
        }
    }

    pub fn context(&self) -> SimContext {
        self.ctx.clone()
    }

    pub fn tick(&self) -> u64 {
        self.ctx.tick()
    }

    pub fn halted(&self) -> Option<&HarnessError> {
        self.halted.as_ref()
    }

    pub fn spawn(&mut self, name: &str, future: impl Future<Output = HarnessResult<()>> + 'static) -> TaskId {
        self.executor.spawn(name, future)
    }

    pub fn is_done(&self, task: TaskId) -> bool {
        self.executor.is_done(task)
    }

    fn guarded(&mut self, step: impl FnOnce(&mut Self) -> HarnessResult<()>) -> HarnessResult<()> {
        if let Some(err) = &self.halted {
            return Err(err.clone());
        }
        let result = step(self);
        if let Err(err) = &result {
            error!(tick = self.tick(), error = %err, "halting clock");
            self.halted = Some(err.clone());
        }
        result
    }

    /// Runs tasks that are ready without advancing time.
    pub fn run_ready(&mut self) -> HarnessResult<()> {
        self.guarded(|s| s.executor.run_ready())
    }

    /// One complete DRIVE, SETTLE, SAMPLE cycle.
    pub fn advance_tick(&mut self) -> HarnessResult<()> {
        self.guarded(|s| s.step())
    }

    fn enter(&mut self, phase: Phase) {
        let wakers = self.ctx.state.get_mut().enter(phase);
        for waker in wakers {
            waker.wake();
        }
    }

    fn step(&mut self) -> HarnessResult<()> {
        let tick = self.tick();
        self.ctx.state.get_mut().snapshot = None;

        self.enter(Phase::Drive);
        self.executor.run_ready()?;

        self.enter(Phase::Settle);
        let captured = {
            let model = self.ctx.model.get().clone();
            let model = model.as_ref().map(|m| m.get());
            SignalSnapshot::capture(&*self.ctx.dut.get(), &self.ctx.config, model.as_deref(), tick)
        };
        let snapshot = match captured {
            Ok(snapshot) => Some(snapshot),
            Err(err) if !err.is_fatal() => {
                debug!(tick, error = %err, "no snapshot this tick");
                None
            }
            Err(err) => return Err(err),
        };
        self.ctx.state.get_mut().snapshot = snapshot;
        self.ctx.dut.get_mut().clock_edge();

        self.enter(Phase::Sample);
        self.executor.run_ready()?;

        self.ctx.state.get_mut().tick += 1;
        Ok(())
    }

    /// Advances time until `task` finishes, a task fails, or `max_ticks`
    /// ticks pass. Returns the number of ticks used.
    pub fn run_until_done(&mut self, task: TaskId, max_ticks: u64) -> HarnessResult<u64> {
        let start = self.tick();
        self.run_ready()?;
        while !self.executor.is_done(task) {
            if self.tick() - start >= max_ticks {
                let err = HarnessError::Timeout {
                    condition: "scenario to finish".into(),
                    max_ticks,
                    tick: self.tick(),
                };
                self.halted = Some(err.clone());
                return Err(err);
            }
            self.advance_tick()?;
        }
        let used = self.tick() - start;
        debug!(ticks = %used.to_formatted_string(&Locale::en), "task finished");
        Ok(used)
    }

    /// Drops every task and pending trigger.
    pub fn shutdown(&mut self) {
        debug!(
            tick = self.tick(),
            tasks = self.executor.pending(),
            triggers = self.ctx.state.get().waiting(),
            "shutdown"
        );
        self.executor.clear();
        self.ctx.state.get_mut().clear_waiters();
    }
}
