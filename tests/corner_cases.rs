//! The corner scenarios of the queue core run as one session, with coverage
//! accumulated across all of them and the results exported as JUnit.

use pretty_assertions::assert_eq;
use queue_tb::prelude::*;
use std::fs;

const WRITE: u32 = 4;
const READ: u32 = 3;
const NOT_EMPTY: u32 = 2;
const NOT_FULL: u32 = 0;

const CORNERS: [&str; 6] = [
    "complete_coverage_fill",
    "write_same_repeatedly",
    "write_when_full",
    "read_when_empty",
    "rapid_toggle",
    "over_read",
];

fn run_corners() -> SessionReport {
    init_logging();
    let config = HarnessConfig::default();
    let dut = dut_handle(RegisterFifo::new(&config));
    let mut session = TestSession::new("corner_cases", config, dut, &CORNERS).unwrap();

    session.run_scenario("complete_coverage_fill", |env| async move {
        env.write(WRITE, 1).await?;
        for address in [NOT_FULL, NOT_EMPTY, READ] {
            env.read(address).await?;
        }
        Ok(())
    });

    session.run_scenario("write_same_repeatedly", |env| async move {
        for _ in 0..3 {
            env.write(WRITE, 1).await?;
            env.context().next_drive().await;
        }
        for _ in 0..3 {
            env.read(READ).await?;
        }
        Ok(())
    });

    session.run_scenario("write_when_full", |env| async move {
        let capacity = env.config().queues[0].capacity;
        for i in 0..=capacity as u32 {
            env.write(WRITE, i & 1).await?;
        }
        Ok(())
    });

    session.run_scenario("read_when_empty", |env| async move {
        env.read(READ).await?;
        env.context().clock_cycles(2).await;
        Ok(())
    });

    session.run_scenario("rapid_toggle", |env| async move {
        env.write(WRITE, 1).await?;
        for i in 0..4 {
            env.write_and_read(WRITE, i % 2, READ).await?;
            env.context().next_drive().await;
        }
        env.read(READ).await?;
        Ok(())
    });

    session.run_scenario("over_read", |env| async move {
        let capacity = env.config().queues[0].capacity;
        for i in 0..capacity as u32 {
            env.write(WRITE, 0x10 + i).await?;
        }
        env.wait_until_not_empty("fifo", 4).await?;
        for _ in 0..capacity + 2 {
            env.read(READ).await?;
        }
        Ok(())
    });

    session.finish()
}

#[test]
fn every_corner_passes_and_is_covered() {
    let report = run_corners();
    for outcome in &report.outcomes {
        assert_eq!(outcome.result, Ok(()), "{}", outcome.name);
    }
    for corner in CORNERS {
        assert_eq!(report.coverage.hits(&corner_bin(corner)), Some(1), "{corner}");
    }
    assert_eq!(report.coverage.uncovered(), Vec::<&str>::new());
    assert!(report.meets_goal());
}

#[test]
fn write_when_full_is_counted_once_per_attempt() {
    let report = run_corners();
    assert_eq!(report.coverage.hits(WRITE_WHEN_FULL), Some(1));
    let full = report.outcome("write_when_full").unwrap();
    assert_eq!(full.stats.writes, 5);
}

#[test]
fn report_renders_every_scenario() {
    let report = run_corners();
    let text = report.to_string();
    for corner in CORNERS {
        assert!(text.contains(corner), "{corner} missing from\n{text}");
    }
    assert!(text.contains("Total coverage:"));
    assert!(text.contains("met"));
}

#[test]
fn junit_lists_each_scenario() {
    let report = run_corners();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.xml");
    write_junit_file(&report, &path).unwrap();

    let xml = fs::read_to_string(&path).unwrap();
    assert!(xml.contains("corner_cases"));
    for corner in CORNERS {
        assert!(xml.contains(&format!("name=\"{corner}\"")), "{corner}");
    }
    assert!(!xml.contains("<failure"));
}

#[test]
fn junit_records_failures() {
    init_logging();
    let config = HarnessConfig::default();
    let faults = FaultPlan {
        corrupt_read: Some((0, 0xff)),
        ..FaultPlan::default()
    };
    let dut = dut_handle(RegisterFifo::with_faults(&config, faults));
    let mut session = TestSession::new("broken", config, dut, &[]).unwrap();
    session.run_scenario("corrupted", |env| async move {
        env.write(WRITE, 0x0f).await?;
        env.read(READ).await?;
        Ok(())
    });
    let report = session.finish();

    let mut xml = Vec::new();
    write_junit(&report, &mut xml).unwrap();
    let xml = String::from_utf8(xml).unwrap();
    assert!(xml.contains("<failure"));
    assert!(xml.contains("Mismatch"));
}
