//! Run summary

use crate::progress::{Console, Level};
use crate::state::{CancelReason, RunState};
use crate::supervisor::AttackResult;

/// Aggregated outcome of a run, with results sorted by task index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub results: Vec<AttackResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: Option<CancelReason>,
}

/// Count successes and failures and capture why the run stopped, if it did
pub fn summarize(results: &[AttackResult], state: &RunState) -> Report {
    let mut results = results.to_vec();
    results.sort_by_key(|r| r.index);

    let succeeded = results.iter().filter(|r| r.status.is_success()).count();

    Report {
        failed: results.len() - succeeded,
        succeeded,
        cancelled: state.reason(),
        results,
    }
}

impl Report {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Lines of the summary block, in emission order
    pub fn lines(&self) -> Vec<(Level, String)> {
        let mut lines = Vec::with_capacity(self.results.len() + 6);

        match &self.cancelled {
            Some(CancelReason::SuccessFound { needle, .. }) => {
                lines.push((
                    Level::Alert,
                    format!("ALL ATTACKS STOPPED - Success string '{}' was found!", needle),
                ));
                lines.push((Level::Plain, String::new()));
            }
            Some(CancelReason::Interrupted) => {
                lines.push((
                    Level::Alert,
                    "RUN INTERRUPTED - remaining attacks were stopped".to_string(),
                ));
                lines.push((Level::Plain, String::new()));
            }
            None => {}
        }

        lines.push((Level::Info, format!("Total attacks: {}", self.total())));
        lines.push((Level::Success, format!("Successful: {}", self.succeeded)));
        lines.push((Level::Failure, format!("Failed: {}", self.failed)));

        for result in &self.results {
            let mark = if result.status.is_success() { "✓" } else { "✗" };
            lines.push((
                Level::Plain,
                format!("  [{}] Attack #{}: {}", mark, result.number(), result.status),
            ));
        }

        lines
    }

    /// Print the summary block through the console (and its sink)
    pub fn emit(&self, console: &Console) {
        console.blank();
        console.header("Attack Summary");
        for (level, text) in self.lines() {
            console.emit(level, &text);
        }
    }
}
