//! Sequential scenario runner.
//!
//! A session owns the DUT and the coverage tracker for its whole lifetime.
//! Scenarios run one after another against the same DUT; each gets a fresh
//! environment but feeds the same tracker, so coverage accumulates and a
//! failing scenario neither stops the session nor loses what was covered.

use num_format::{Locale, ToFormattedString};
use prettytable::{Cell, Row, Table};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::info;

use crate::config::HarnessConfig;
use crate::coverage::{CoverageReport, CoverageTracker};
use crate::environment::{Environment, ScenarioOutcome};
use crate::error::HarnessResult;
use crate::shared::Shared;
use crate::sim_if::DutHandle;

pub struct TestSession {
    name: String,
    config: Rc<HarnessConfig>,
    dut: DutHandle,
    coverage: Shared<CoverageTracker>,
    outcomes: Vec<ScenarioOutcome>,
}

impl TestSession {
    /// Validates `config` and declares the queue core's bins plus one
    /// corner bin per name in `scenarios`.
    pub fn new(name: &str, config: HarnessConfig, dut: DutHandle, scenarios: &[&str]) -> HarnessResult<Self> {
        config.validate()?;
        let coverage = CoverageTracker::for_queue_core(&config, scenarios)?;
        Self::with_coverage(name, config, dut, coverage)
    }

    /// Same as [`new`](Self::new) with a caller-built bin registry.
    pub fn with_coverage(
        name: &str,
        config: HarnessConfig,
        dut: DutHandle,
        coverage: CoverageTracker,
    ) -> HarnessResult<Self> {
        config.validate()?;
        info!(session = name, dut = dut.get().name(), bins = coverage.bins().len(), "session started");
        Ok(Self {
            name: name.to_string(),
            config: Rc::new(config),
            dut,
            coverage: Shared::new(coverage),
            outcomes: Vec::new(),
        })
    }

    pub fn run_scenario<F, Fut>(&mut self, name: &str, body: F) -> &ScenarioOutcome
    where
        F: FnOnce(Environment) -> Fut,
        Fut: Future<Output = HarnessResult<()>> + 'static,
    {
        let outcome = Environment::run_scenario(
            name,
            self.config.clone(),
            self.dut.clone(),
            self.coverage.clone(),
            body,
        );
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn outcomes(&self) -> &[ScenarioOutcome] {
        &self.outcomes
    }

    pub fn coverage(&self) -> Shared<CoverageTracker> {
        self.coverage.clone()
    }

    pub fn dut(&self) -> DutHandle {
        self.dut.clone()
    }

    pub fn finish(self) -> SessionReport {
        let coverage = self.coverage.get().report();
        let report = SessionReport {
            name: self.name,
            outcomes: self.outcomes,
            coverage_goal: self.config.coverage_goal,
            coverage,
        };
        info!(
            session = %report.name,
            passed = report.passed(),
            failed = report.failed(),
            coverage = report.coverage.percent,
            "session finished"
        );
        report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub name: String,
    pub outcomes: Vec<ScenarioOutcome>,
    pub coverage: CoverageReport,
    pub coverage_goal: f64,
}

impl SessionReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn meets_goal(&self) -> bool {
        self.coverage.meets(self.coverage_goal)
    }

    pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(vec![
            Cell::new("scenario"),
            Cell::new("result"),
            Cell::new("ticks"),
            Cell::new("time (s)"),
            Cell::new("matched"),
        ]));
        for o in &self.outcomes {
            let result = match &o.result {
                Ok(()) => "passed".to_string(),
                Err(err) => format!("failed: {}", err.kind()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&o.name),
                Cell::new(&result),
                Cell::new(&o.ticks.to_formatted_string(&Locale::en)),
                Cell::new(&format!("{:.3}", o.wall_secs)),
                Cell::new(&o.stats.matched.to_string()),
            ]));
        }
        table
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SESSION {}", self.name)?;
        write!(f, "{}", self.table())?;
        for o in &self.outcomes {
            if let Err(err) = &o.result {
                writeln!(f, "{}: {err}", o.name)?;
            }
        }
        writeln!(f, "{}", self.coverage)?;
        let verdict = if self.meets_goal() { "met" } else { "missed" };
        write!(f, "Coverage goal {:.2}% {verdict}", self.coverage_goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use crate::fifo_model::RegisterFifo;
    use crate::sim_if::dut_handle;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = HarnessConfig::default();
        config.data_width = 0;
        let dut = dut_handle(RegisterFifo::new(&HarnessConfig::default()));
        let err = TestSession::new("bad", config, dut, &[]).err();
        assert!(matches!(err, Some(HarnessError::Config(_))));
    }

    #[test]
    fn empty_session_reports_nothing_run() {
        let config = HarnessConfig::default();
        let dut = dut_handle(RegisterFifo::new(&config));
        let session = TestSession::new("empty", config, dut, &["idle"]).unwrap();
        let report = session.finish();
        assert_eq!((report.passed(), report.failed()), (0, 0));
        assert!(report.all_passed());
        assert!(!report.meets_goal());
        assert_eq!(report.coverage.hits("corner_idle"), Some(0));
    }
}
