pub use crate::config::{DutCapabilities, HarnessConfig, QueueConfig, RegisterRole, SameTickPolicy};
pub use crate::coverage::{
    corner_bin, read_addr_bin, write_addr_bin, CoverageBuilder, CoverageReport, CoverageTracker,
    EMPTY_FLAG_ASSERTED, FULL_FLAG_ASSERTED, READ_WHEN_EMPTY, READ_WHEN_FULL, RESET_ASSERTED,
    SIMULTANEOUS_READ_WRITE, WRITE_WHEN_EMPTY, WRITE_WHEN_FULL,
};
pub use crate::environment::{Environment, ScenarioOutcome};
pub use crate::fifo_model::{FaultPlan, RegisterFifo};
pub use crate::junit::{write_junit, write_junit_file};
pub use crate::logging::init_logging;
pub use crate::scheduler::{ClockPhaseScheduler, SignalSnapshot, SimContext};
pub use crate::scoreboard::{MismatchRecord, ScoreboardStats};
pub use crate::session::{SessionReport, TestSession};
pub use crate::sim_if::{dut_handle, DutHandle, InputPort, OutputPort, SimIf};
pub use crate::transaction::{Transaction, TxKind};
pub use crate::value::SignalValue;
pub use crate::{HarnessError, HarnessResult, Phase, Shared};
pub use futures::future::FutureExt;
