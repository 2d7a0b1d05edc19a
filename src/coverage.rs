//! Functional coverage.
//!
//! The set of bins is fixed when the tracker is built. Sampled bins carry a
//! predicate over the tick's [`SignalSnapshot`]; event bins are hit
//! explicitly by whoever detects the event (the driver for a write into a
//! full queue, the session for a corner scenario starting). Nothing creates
//! a bin after construction, so a typo shows up as `UnknownBin` instead of a
//! silently empty counter.
//!
//! `sample` is not deduplicated: calling it twice for one SAMPLE phase counts
//! twice. The environment calls it exactly once per tick.

use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::scheduler::SignalSnapshot;

pub const WRITE_WHEN_EMPTY: &str = "write_when_empty";
pub const WRITE_WHEN_FULL: &str = "write_when_full";
pub const READ_WHEN_EMPTY: &str = "read_when_empty";
pub const READ_WHEN_FULL: &str = "read_when_full";
pub const SIMULTANEOUS_READ_WRITE: &str = "simultaneous_read_write";
pub const FULL_FLAG_ASSERTED: &str = "full_flag_asserted";
pub const EMPTY_FLAG_ASSERTED: &str = "empty_flag_asserted";
pub const RESET_ASSERTED: &str = "reset_asserted";

pub fn write_addr_bin(address: u32) -> String {
    format!("write_addr_{address}")
}

pub fn read_addr_bin(address: u32) -> String {
    format!("read_addr_{address}")
}

pub fn corner_bin(scenario: &str) -> String {
    format!("corner_{scenario}")
}

type Predicate = Box<dyn Fn(&SignalSnapshot) -> bool>;

pub struct CoverageBin {
    name: String,
    hits: u64,
    predicate: Option<Predicate>,
}

impl CoverageBin {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn hits(&self) -> u64 {
        self.hits
    }
    pub fn is_sampled(&self) -> bool {
        self.predicate.is_some()
    }
}

impl fmt::Debug for CoverageBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageBin")
            .field("name", &self.name)
            .field("hits", &self.hits)
            .field("sampled", &self.is_sampled())
            .finish()
    }
}

#[derive(Default)]
pub struct CoverageBuilder {
    bins: Vec<CoverageBin>,
}

impl CoverageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sampled(mut self, name: &str, predicate: impl Fn(&SignalSnapshot) -> bool + 'static) -> Self {
        self.bins.push(CoverageBin {
            name: name.to_string(),
            hits: 0,
            predicate: Some(Box::new(predicate)),
        });
        self
    }

    pub fn event(mut self, name: &str) -> Self {
        self.bins.push(CoverageBin {
            name: name.to_string(),
            hits: 0,
            predicate: None,
        });
        self
    }

    pub fn build(self) -> HarnessResult<CoverageTracker> {
        let mut index = HashMap::with_capacity(self.bins.len());
        for (i, bin) in self.bins.iter().enumerate() {
            if index.insert(bin.name.clone(), i).is_some() {
                return Err(HarnessError::Config(format!("coverage bin '{}' declared twice", bin.name)));
            }
        }
        Ok(CoverageTracker {
            bins: self.bins,
            index,
            samples: 0,
        })
    }
}

#[derive(Debug)]
pub struct CoverageTracker {
    bins: Vec<CoverageBin>,
    index: HashMap<String, usize>,
    samples: u64,
}

impl CoverageTracker {
    /// The queue core's bin set: the FIFO corner conditions, one bin per
    /// mapped write and read address, and one event bin per named scenario.
    ///
    /// The full/empty conditions read [`QueueFlags`], so on a core without
    /// those outputs they follow the reference model's occupancy instead.
    ///
    /// [`QueueFlags`]: crate::scheduler::QueueFlags
    pub fn for_queue_core(config: &HarnessConfig, scenarios: &[&str]) -> HarnessResult<Self> {
        let mut builder = CoverageBuilder::new()
            .sampled(WRITE_WHEN_EMPTY, |s| s.write_enable && s.write_flags().empty == Some(true))
            .event(WRITE_WHEN_FULL)
            .sampled(READ_WHEN_EMPTY, |s| s.read_enable && s.read_flags().empty == Some(true))
            .sampled(READ_WHEN_FULL, |s| s.read_enable && s.read_flags().full == Some(true))
            .sampled(SIMULTANEOUS_READ_WRITE, |s| s.write_enable && s.read_enable)
            .sampled(FULL_FLAG_ASSERTED, |s| s.any_full())
            .sampled(EMPTY_FLAG_ASSERTED, |s| s.any_empty())
            .sampled(RESET_ASSERTED, |s| s.reset_active);
        for address in config.write_addresses() {
            builder = builder.sampled(&write_addr_bin(address), move |s| {
                s.write_enable && s.write_address == address
            });
        }
        for address in config.read_addresses() {
            builder = builder.sampled(&read_addr_bin(address), move |s| {
                s.read_enable && s.read_address == address
            });
        }
        for scenario in scenarios {
            builder = builder.event(&corner_bin(scenario));
        }
        builder.build()
    }

    /// Increments every sampled bin whose predicate holds for `snapshot`.
    pub fn sample(&mut self, snapshot: &SignalSnapshot) {
        self.samples += 1;
        for bin in &mut self.bins {
            if let Some(predicate) = &bin.predicate {
                if predicate(snapshot) {
                    bin.hits += 1;
                    trace!(tick = snapshot.tick, bin = %bin.name, "coverage hit");
                }
            }
        }
    }

    /// Increments a declared bin.
    pub fn hit(&mut self, name: &str) -> HarnessResult<()> {
        match self.index.get(name) {
            Some(&i) => {
                self.bins[i].hits += 1;
                Ok(())
            }
            None => Err(HarnessError::UnknownBin(name.to_string())),
        }
    }

    /// Like [`hit`](Self::hit) for optional bins: increments `name` only if it
    /// was declared and reports whether it was.
    pub fn hit_if_declared(&mut self, name: &str) -> bool {
        self.hit(name).is_ok()
    }

    pub fn hits(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|&i| self.bins[i].hits)
    }

    pub fn bins(&self) -> &[CoverageBin] {
        &self.bins
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Zeroes every counter; the bin set is unchanged.
    pub fn clear(&mut self) {
        for bin in &mut self.bins {
            bin.hits = 0;
        }
        self.samples = 0;
    }

    pub fn report(&self) -> CoverageReport {
        let bins: Vec<BinReport> = self
            .bins
            .iter()
            .map(|b| BinReport {
                name: b.name.clone(),
                hits: b.hits,
                covered: b.hits > 0,
            })
            .collect();
        let total = bins.len();
        let covered = bins.iter().filter(|b| b.covered).count();
        let percent = if total == 0 {
            0.0
        } else {
            covered as f64 * 100.0 / total as f64
        };
        CoverageReport {
            bins,
            covered,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinReport {
    pub name: String,
    pub hits: u64,
    pub covered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub bins: Vec<BinReport>,
    pub covered: usize,
    pub total: usize,
    pub percent: f64,
}

impl CoverageReport {
    pub fn hits(&self, name: &str) -> Option<u64> {
        self.bins.iter().find(|b| b.name == name).map(|b| b.hits)
    }

    pub fn uncovered(&self) -> Vec<&str> {
        self.bins
            .iter()
            .filter(|b| !b.covered)
            .map(|b| b.name.as_str())
            .collect()
    }

    pub fn meets(&self, goal: f64) -> bool {
        self.percent >= goal
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(Row::new(vec![Cell::new("bin"), Cell::new("hits"), Cell::new("covered")]));
        for bin in &self.bins {
            table.add_row(Row::new(vec![
                Cell::new(&bin.name),
                Cell::new(&bin.hits.to_string()),
                Cell::new(if bin.covered { "yes" } else { "no" }),
            ]));
        }
        table
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table())?;
        write!(
            f,
            "Total coverage: {}/{} bins hit ({:.2}%)",
            self.covered, self.total, self.percent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::QueueFlags;

    fn snapshot() -> SignalSnapshot {
        SignalSnapshot {
            tick: 0,
            write_enable: false,
            write_address: 0,
            write_data: 0,
            read_enable: false,
            read_address: 0,
            reset_active: false,
            write_queue: None,
            read_queue: None,
            flags: vec![QueueFlags {
                full: Some(false),
                empty: Some(true),
            }],
        }
    }

    #[test]
    fn predicates_pick_their_bins() {
        let config = HarnessConfig::default();
        let mut cov = CoverageTracker::for_queue_core(&config, &[]).unwrap();
        let mut snap = snapshot();
        snap.write_enable = true;
        snap.write_address = 4;
        snap.write_queue = Some(0);
        cov.sample(&snap);

        assert_eq!(cov.hits(WRITE_WHEN_EMPTY), Some(1));
        assert_eq!(cov.hits(EMPTY_FLAG_ASSERTED), Some(1));
        assert_eq!(cov.hits(&write_addr_bin(4)), Some(1));
        assert_eq!(cov.hits(READ_WHEN_EMPTY), Some(0));
        assert_eq!(cov.hits(WRITE_WHEN_FULL), Some(0));
        assert_eq!(cov.samples(), 1);
    }

    #[test]
    fn undeclared_bins_are_rejected() {
        let mut cov = CoverageBuilder::new().event("a").build().unwrap();
        cov.hit("a").unwrap();
        assert_eq!(cov.hit("b"), Err(HarnessError::UnknownBin("b".into())));
        assert_eq!(cov.hits("b"), None);
        assert!(CoverageBuilder::new().event("a").event("a").build().is_err());
    }

    #[test]
    fn empty_registry_reports_zero_percent() {
        let cov = CoverageBuilder::new().build().unwrap();
        let report = cov.report();
        assert_eq!(report.total, 0);
        assert_eq!(report.percent, 0.0);
    }

    #[test]
    fn report_is_stable_without_sampling() {
        let mut cov = CoverageBuilder::new().event("a").event("b").build().unwrap();
        cov.hit("a").unwrap();
        let first = cov.report();
        assert_eq!(first, cov.report());
        assert_eq!(first.percent, 50.0);
        assert_eq!(first.uncovered(), vec!["b"]);
        assert!(first.to_string().contains("1/2 bins hit (50.00%)"));
    }

    #[test]
    fn rendered_table_lists_every_bin() {
        let mut cov = CoverageBuilder::new().event("a").event("bb").build().unwrap();
        cov.hit("bb").unwrap();
        let text = cov.report().to_string();
        let rows: Vec<&str> = text.lines().filter(|l| l.starts_with('|')).collect();
        // Title plus one row per bin.
        assert_eq!(rows.len(), 3, "{text}");
        assert!(rows[1].contains(" a ") && rows[1].contains(" no "), "{text}");
        assert!(rows[2].contains(" bb ") && rows[2].contains(" yes "), "{text}");
        assert!(text.ends_with("Total coverage: 1/2 bins hit (50.00%)"));
    }
}
