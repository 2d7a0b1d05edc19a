use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::scheduler::SignalSnapshot;
use crate::shared::Shared;

/// The three ordered phases of every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Stimulus is applied.
    Drive,
    /// The DUT reacts to the active clock edge. Owned by the simulator.
    Settle,
    /// Post-edge values are observed.
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrigKind {
    Drive,
    Sample,
}

/// Bookkeeping shared by the scheduler and every pending trigger.
#[derive(Debug)]
pub struct PhaseState {
    pub(crate) tick: u64,
    pub(crate) phase: Phase,
    // Number of DRIVE / SAMPLE phases entered so far.
    pub(crate) drive_epoch: u64,
    pub(crate) sample_epoch: u64,
    drive_waiters: VecDeque<Waker>,
    sample_waiters: VecDeque<Waker>,
    pub(crate) snapshot: Option<SignalSnapshot>,
}

impl PhaseState {
    pub(crate) fn new() -> Self {
        Self {
            tick: 0,
            // Before the first tick nothing may drive or sample.
            phase: Phase::Settle,
            drive_epoch: 0,
            sample_epoch: 0,
            drive_waiters: VecDeque::new(),
            sample_waiters: VecDeque::new(),
            snapshot: None,
        }
    }

    fn epoch(&self, kind: TrigKind) -> u64 {
        match kind {
            TrigKind::Drive => self.drive_epoch,
            TrigKind::Sample => self.sample_epoch,
        }
    }

    fn register(&mut self, kind: TrigKind, waker: Waker, high_prio: bool) {
        let waiters = match kind {
            TrigKind::Drive => &mut self.drive_waiters,
            TrigKind::Sample => &mut self.sample_waiters,
        };
        match high_prio {
            false => waiters.push_back(waker),
            true => waiters.push_front(waker),
        }
    }

    /// Enters `phase` and hands back the wakers of everyone waiting for it.
    pub(crate) fn enter(&mut self, phase: Phase) -> VecDeque<Waker> {
        self.phase = phase;
        match phase {
            Phase::Drive => {
                self.drive_epoch += 1;
                std::mem::take(&mut self.drive_waiters)
            }
            Phase::Sample => {
                self.sample_epoch += 1;
                std::mem::take(&mut self.sample_waiters)
            }
            Phase::Settle => VecDeque::new(),
        }
    }

    pub(crate) fn waiting(&self) -> usize {
        self.drive_waiters.len() + self.sample_waiters.len()
    }

    pub(crate) fn clear_waiters(&mut self) {
        self.drive_waiters.clear();
        self.sample_waiters.clear();
    }
}

/// Resolves at the next DRIVE or SAMPLE phase after it is first polled.
///
/// A trigger created during DRIVE of tick `t` and awaited for DRIVE resolves
/// in DRIVE of tick `t + 1`, never in the phase that is already running.
pub struct Trigger {
    kind: TrigKind,
    // High priority waiters are woken first (the monitor samples before anyone
    // who reads what it published).
    high_prio: bool,
    state: Shared<PhaseState>,
    target: Option<u64>,
}

impl Trigger {
    pub(crate) fn new(state: Shared<PhaseState>, kind: TrigKind, high_prio: bool) -> Self {
        Trigger {
            kind,
            high_prio,
            state,
            target: None,
        }
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let shared = self.state.clone();
        let mut state = shared.get_mut();
        let epoch = state.epoch(self.kind);
        match self.target {
            Some(target) if epoch >= target => Poll::Ready(()),
            // Spurious poll. The executor gives each task one stable waker, so
            // the registration from the first poll is still good.
            Some(_) => Poll::Pending,
            None => {
                state.register(self.kind, cx.waker().clone(), self.high_prio);
                self.target = Some(epoch + 1);
                Poll::Pending
            }
        }
    }
}
