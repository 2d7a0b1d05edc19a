//! One scenario's verification environment.
//!
//! [`Environment::run_scenario`] builds a fresh scheduler, driver, monitor,
//! scoreboard and reference model around a DUT and a coverage tracker that
//! outlive the scenario, wires the monitor to the scoreboard over a channel,
//! and runs the scenario body under the tick watchdog.

use futures_channel::mpsc;
use rand::seq::SliceRandom;
use std::future::Future;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::HarnessConfig;
use crate::coverage::{corner_bin, CoverageTracker};
use crate::driver::Driver;
use crate::error::{HarnessError, HarnessResult};
use crate::monitor::Monitor;
use crate::reference::ReferenceModel;
use crate::scheduler::{ClockPhaseScheduler, SimContext};
use crate::scoreboard::{Scoreboard, ScoreboardStats};
use crate::shared::Shared;
use crate::sim_if::{DutHandle, OutputPort};
use crate::utils::{chance, rand_data, seeded_rng};

/// What a finished scenario leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub name: String,
    pub result: HarnessResult<()>,
    /// Ticks the scenario ran for.
    pub ticks: u64,
    pub wall_secs: f64,
    pub stats: ScoreboardStats,
    /// Monitor samples dropped because a port was unresolved.
    pub skipped_samples: u64,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone, Copy)]
enum Readiness {
    NotEmpty,
    NotFull,
}

#[derive(Clone)]
pub struct Environment {
    ctx: SimContext,
    driver: Driver,
    monitor: Monitor,
    scoreboard: Scoreboard,
    model: Shared<ReferenceModel>,
    coverage: Shared<CoverageTracker>,
}

impl Environment {
    pub fn new(ctx: SimContext, coverage: Shared<CoverageTracker>) -> Self {
        let config = ctx.shared_config();
        let model = Shared::new(ReferenceModel::new(&config));
        ctx.attach_model(model.clone());
        Self {
            driver: Driver::new(ctx.clone(), model.clone(), coverage.clone()),
            monitor: Monitor::new(ctx.clone()),
            scoreboard: Scoreboard::new(model.clone(), config),
            ctx,
            model,
            coverage,
        }
    }

    /// Runs `body` as one scenario against `dut`. Never panics on a scenario
    /// failure; the error ends up in the outcome and the DUT and coverage are
    /// ready for the next scenario.
    pub fn run_scenario<F, Fut>(
        name: &str,
        config: Rc<HarnessConfig>,
        dut: DutHandle,
        coverage: Shared<CoverageTracker>,
        body: F,
    ) -> ScenarioOutcome
    where
        F: FnOnce(Environment) -> Fut,
        Fut: Future<Output = HarnessResult<()>> + 'static,
    {
        let started = Instant::now();
        let ctx = SimContext::new(dut, config.clone());
        let mut sched = ClockPhaseScheduler::new(ctx.clone());
        let env = Environment::new(ctx, coverage);

        let (tx, rx) = mpsc::unbounded();
        sched.spawn("monitor", env.monitor.clone().run(tx));
        sched.spawn("scoreboard", env.scoreboard.clone().run(rx));
        sched.spawn("coverage", env.clone().sample_coverage());

        if env.coverage.get_mut().hit_if_declared(&corner_bin(name)) {
            debug!(scenario = name, "corner bin hit");
        }

        info!(scenario = name, "scenario started");
        let body = body(env.clone());
        let scenario = env.clone();
        let main = sched.spawn(name, async move {
            scenario.start().await?;
            body.await
        });
        let result = sched
            .run_until_done(main, config.scenario_timeout_ticks)
            .map(|_| ());
        sched.shutdown();

        let outcome = ScenarioOutcome {
            name: name.to_string(),
            ticks: sched.tick(),
            wall_secs: started.elapsed().as_secs_f64(),
            stats: env.scoreboard.stats(),
            skipped_samples: env.monitor.skipped(),
            result,
        };
        match &outcome.result {
            Ok(()) => info!(scenario = name, ticks = outcome.ticks, "scenario passed"),
            Err(err) => error!(scenario = name, ticks = outcome.ticks, kind = err.kind(), error = %err, "scenario failed"),
        }
        outcome
    }

    async fn sample_coverage(self) -> HarnessResult<()> {
        loop {
            self.ctx.next_sample().await;
            if let Some(snapshot) = self.ctx.snapshot() {
                self.coverage.get_mut().sample(&snapshot);
            }
        }
    }

    /// Initializes the inputs and applies the configured reset sequence.
    pub async fn start(&self) -> HarnessResult<()> {
        self.driver.initialize().await?;
        self.reset().await
    }

    pub async fn reset(&self) -> HarnessResult<()> {
        let config = self.ctx.config();
        self.driver
            .drive_reset(config.reset_low_ticks, config.reset_recovery_ticks)
            .await
    }

    pub async fn write(&self, address: u32, data: u32) -> HarnessResult<u64> {
        self.driver.write(address, data).await
    }

    pub async fn read(&self, address: u32) -> HarnessResult<u64> {
        self.driver.read(address).await
    }

    pub async fn write_and_read(&self, write_address: u32, data: u32, read_address: u32) -> HarnessResult<u64> {
        self.driver.write_and_read(write_address, data, read_address).await
    }

    pub async fn write_held(&self, address: u32, values: &[u32]) -> HarnessResult<u64> {
        self.driver.write_held(address, values).await
    }

    /// Reads a register and returns what the monitor saw on `read_data`, or
    /// `None` if that tick's sample was skipped as unresolved.
    pub async fn read_status(&self, address: u32) -> HarnessResult<Option<u32>> {
        let tick = self.driver.read(address).await?;
        match self.monitor.last_read(address) {
            Some(t) if t.tick == tick => Ok(Some(t.data)),
            _ => {
                debug!(tick, address, "no resolved status sample");
                Ok(None)
            }
        }
    }

    pub async fn wait_until_not_empty(&self, queue: &str, max_ticks: u64) -> HarnessResult<u64> {
        self.wait_ready(queue, Readiness::NotEmpty, max_ticks).await
    }

    pub async fn wait_until_not_full(&self, queue: &str, max_ticks: u64) -> HarnessResult<u64> {
        self.wait_ready(queue, Readiness::NotFull, max_ticks).await
    }

    async fn wait_ready(&self, queue: &str, readiness: Readiness, max_ticks: u64) -> HarnessResult<u64> {
        let config = self.ctx.config();
        let index = config
            .queue_index(queue)
            .ok_or_else(|| HarnessError::Config(format!("unknown queue '{queue}'")))?;
        let (condition, flag, flag_port, status_address) = match readiness {
            Readiness::NotEmpty => (
                format!("queue '{queue}' not empty"),
                config.capabilities.has_empty_flag,
                OutputPort::Empty(index),
                config.queues[index].not_empty_address,
            ),
            Readiness::NotFull => (
                format!("queue '{queue}' not full"),
                config.capabilities.has_full_flag,
                OutputPort::Full(index),
                config.queues[index].not_full_address,
            ),
        };

        if flag {
            let ctx = &self.ctx;
            return ctx
                .wait_until(&condition, max_ticks, || {
                    Ok(!ctx.sample_output(flag_port)?.to_bool(&flag_port.to_string())?)
                })
                .await;
        }

        let Some(address) = status_address else {
            return Err(HarnessError::Config(format!(
                "queue '{queue}' has neither a flag nor a status register to poll"
            )));
        };
        // Each poll is one status read, so one tick.
        for _ in 0..max_ticks {
            if let Some(1..) = self.read_status(address).await? {
                return Ok(self.ctx.tick());
            }
        }
        Err(HarnessError::Timeout {
            condition,
            max_ticks,
            tick: self.ctx.tick(),
        })
    }

    /// Issues `ops` randomly chosen operations against the mapped addresses:
    /// writes, reads and same-tick write/read pairs.
    pub async fn random_traffic(&self, ops: usize, seed: u64) -> HarnessResult<()> {
        let config = self.ctx.config();
        let writes = config.write_addresses();
        let reads: Vec<u32> = config
            .queues
            .iter()
            .flat_map(|q| q.read_addresses.iter().copied())
            .collect();
        let width = config.data_width;
        let mut rng = seeded_rng(seed);
        debug!(ops, seed, "random traffic");
        for _ in 0..ops {
            let write = match chance(&mut rng, 0.5) {
                true => writes.choose(&mut rng).map(|&a| (a, rand_data(&mut rng, width))),
                false => None,
            };
            let read = match chance(&mut rng, 0.5) {
                true => reads.choose(&mut rng).copied(),
                false => None,
            };
            match (write, read) {
                (Some((address, data)), Some(read_address)) => {
                    self.write_and_read(address, data, read_address).await?;
                }
                (Some((address, data)), None) => {
                    self.write(address, data).await?;
                }
                (None, Some(address)) => {
                    self.read(address).await?;
                }
                (None, None) => self.ctx.next_drive().await,
            }
        }
        Ok(())
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn config(&self) -> &HarnessConfig {
        self.ctx.config()
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn model(&self) -> Shared<ReferenceModel> {
        self.model.clone()
    }

    pub fn coverage(&self) -> Shared<CoverageTracker> {
        self.coverage.clone()
    }
}
