//! Pass/fail accumulation for one scenario run.

use tracing::warn;

/// Accumulated assertion failures for one scenario.
///
/// A scenario never stops at its first violation; every failure found in the
/// run is recorded here so one run yields maximal diagnostic value.
#[derive(Debug)]
pub struct Report {
    scenario: String,
    failures: Vec<String>,
}

impl Report {
    /// Start an empty report for the named scenario.
    #[must_use]
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            failures: Vec::new(),
        }
    }

    /// Record one assertion failure; remaining checks keep running.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(scenario = %self.scenario, %message, "scenario assertion failed");
        self.failures.push(message);
    }

    /// Whether the scenario finished without a single violation.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.failures.is_empty()
    }

    /// All recorded failures, in discovery order.
    #[must_use]
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Print the final PASS/FAIL verdict and every recorded failure.
    pub fn print_summary(&self) {
        println!();
        if self.is_pass() {
            println!("PASS: {}", self.scenario);
        } else {
            println!("FAIL: {} ({} failure(s))", self.scenario, self.failures.len());
            for failure in &self.failures {
                println!("  - {failure}");
            }
        }
    }
}
