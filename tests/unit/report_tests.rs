//! Unit tests for scenario report accumulation.

use proxy_harness::scenario::Report;

#[test]
fn fresh_report_passes() {
    let report = Report::new("cache-hit");
    assert!(report.is_pass());
    assert!(report.failures().is_empty());
}

#[test]
fn failures_accumulate_in_discovery_order() {
    let mut report = Report::new("concurrency-bound");
    report.fail("task finished early");
    report.fail("probe request failed");
    report.fail("joined outcome was a failure");

    assert!(!report.is_pass());
    assert_eq!(report.failures().len(), 3);
    assert_eq!(report.failures()[0], "task finished early");
    assert_eq!(report.failures()[2], "joined outcome was a failure");
}

#[test]
fn one_failure_flips_the_verdict() {
    let mut report = Report::new("block-list");
    assert!(report.is_pass());
    report.fail("blocked request got through");
    assert!(!report.is_pass());
}
