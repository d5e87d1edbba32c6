//! Attack scheduling
//!
//! Runs the supervisor over every task, either on a bounded worker pool or
//! strictly one after another.

use crate::command::AttackTask;
use crate::error::{Result, SplitError};
use crate::progress::Console;
use crate::supervisor::{AttackResult, Supervisor};

use std::sync::Arc;

/// Default number of simultaneous attacks for `task_count` tasks
pub fn default_workers(task_count: usize) -> usize {
    task_count.min(num_cpus::get()).max(1)
}

pub struct Orchestrator {
    supervisor: Supervisor,
    console: Arc<Console>,
}

impl Orchestrator {
    pub fn new(supervisor: Supervisor, console: Arc<Console>) -> Self {
        Self { supervisor, console }
    }

    /// Run all tasks with at most `max_workers` children alive at once.
    ///
    /// Results come back in completion order. Tasks dispatched after a
    /// cancellation are still launched and then stopped right away.
    pub fn run_parallel(&self, tasks: &[AttackTask], max_workers: Option<usize>) -> Result<Vec<AttackResult>> {
        ensure_tasks(tasks)?;

        let workers = max_workers
            .map(|w| w.clamp(1, tasks.len()))
            .unwrap_or_else(|| default_workers(tasks.len()));

        self.console.blank();
        self.console.info(&format!(
            "Launching {} parallel attacks (max {} simultaneous)",
            tasks.len(),
            workers
        ));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("attack-worker-{}", i))
            .build()?;
        log::debug!("worker pool ready with {} threads", workers);

        let (tx, rx) = crossbeam_channel::unbounded();
        let supervisor = &self.supervisor;

        pool.scope(|scope| {
            for task in tasks {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let result = supervisor.run(task);
                    // Receiver outlives the scope
                    let _ = tx.send(result);
                });
            }
        });
        drop(tx);

        Ok(rx.iter().collect())
    }

    /// Run tasks one at a time in index order, stopping after the first
    /// task that leaves the run cancelled.
    pub fn run_sequential(&self, tasks: &[AttackTask]) -> Result<Vec<AttackResult>> {
        ensure_tasks(tasks)?;

        self.console.blank();
        self.console
            .info(&format!("Launching {} sequential attacks", tasks.len()));

        let state = self.supervisor.state();
        let mut results = Vec::with_capacity(tasks.len());

        for task in tasks {
            if state.is_cancelled() {
                break;
            }

            results.push(self.supervisor.run(task));

            if state.is_cancelled() {
                self.console
                    .alert("Stopping sequential execution due to cancellation");
                break;
            }
        }

        Ok(results)
    }
}

fn ensure_tasks(tasks: &[AttackTask]) -> Result<()> {
    if tasks.is_empty() {
        return Err(SplitError::state(
            "Wordlists have not been split: no tasks to run",
        ));
    }
    Ok(())
}
