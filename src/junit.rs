use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};
use crate::session::SessionReport;

/// JUnit XML for a finished session, one test case per scenario.
pub fn write_junit(report: &SessionReport, out: impl Write) -> HarnessResult<()> {
    let mut test_cases = Vec::new();

    for o in &report.outcomes {
        let time = Duration::seconds_f64(o.wall_secs);
        let tc = match &o.result {
            Ok(()) => TestCaseBuilder::success(&o.name, time),
            Err(e) => TestCaseBuilder::failure(&o.name, time, e.kind(), &e.to_string()),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(&report.name)
        .add_testcases(test_cases)
        .build();
    let junit = ReportBuilder::new().add_testsuite(test_suite).build();
    junit
        .write_xml(out)
        .map_err(|e| HarnessError::Report(format!("{e:?}")))
}

pub fn write_junit_file(report: &SessionReport, path: impl AsRef<Path>) -> HarnessResult<()> {
    let file = File::create(path)?;
    write_junit(report, file)
}
