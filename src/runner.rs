//! End-to-end run
//!
//! Shards the wordlist, builds one task per shard, dispatches them, prints
//! the summary and removes the shards, whatever happened in between.

use crate::cli::RunConfig;
use crate::command::{build_tasks, AttackTask};
use crate::detector::SuccessDetector;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::output::FileSink;
use crate::progress::{format_duration, format_number, Console};
use crate::report::{summarize, Report};
use crate::shard::{ShardSet, Sharder};
use crate::state::RunState;
use crate::supervisor::{AttackResult, Supervisor};

use bytesize::ByteSize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit code after an operator interrupt
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    /// `None` for dry runs and runs interrupted before dispatch
    pub report: Option<Report>,
    pub interrupted: bool,
    /// Shard directory of the run, already removed
    pub shard_dir: PathBuf,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// 0 when the run finished, whatever the attacks returned
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            INTERRUPTED_EXIT_CODE
        } else {
            0
        }
    }
}

pub struct Runner {
    config: RunConfig,
    state: Arc<RunState>,
    console: Arc<Console>,
}

impl Runner {
    /// Create a runner, opening the output file if one is configured.
    /// A file that cannot be opened is reported and the run goes on without it.
    pub fn new(config: RunConfig) -> Self {
        let mut console = Console::new(config.quiet);
        let mut open_error = None;

        if let Some(ref path) = config.output {
            match FileSink::create(path) {
                Ok(sink) => console = console.with_sink(Box::new(sink)),
                Err(e) => open_error = Some(format!("Error opening output file {:?}: {}", path, e)),
            }
        }

        let runner = Self::with_console(config, Arc::new(console));
        if let Some(msg) = open_error {
            runner.console.error(&msg);
        }
        runner
    }

    pub fn with_console(config: RunConfig, console: Arc<Console>) -> Self {
        Self {
            config,
            state: Arc::new(RunState::new()),
            console,
        }
    }

    pub fn state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    pub fn console(&self) -> Arc<Console> {
        Arc::clone(&self.console)
    }

    pub fn grace(&self) -> Duration {
        self.config.grace
    }

    /// Run to completion. The output file, if any, is closed on return.
    pub fn run(&self) -> Result<RunOutcome> {
        let outcome = self.execute();
        self.console.close_sink();
        outcome
    }

    fn execute(&self) -> Result<RunOutcome> {
        self.config.validate()?;
        let started = Instant::now();
        let console = &*self.console;

        console.header("Bruteforce Wordlist Splitter");
        if let Some(ref needle) = self.config.looking_for {
            console.alert(&format!(
                "Auto-stop enabled: will stop all attacks when '{}' is found",
                needle
            ));
            console.blank();
        }

        let mut shards = self.split()?;
        let tasks = build_tasks(&shards, &self.config.command, &self.config.placeholder)?;

        let report = if self.config.dry_run {
            self.print_plan(&tasks);
            None
        } else if self.state.is_cancelled() {
            None
        } else {
            let results = self.dispatch(&tasks)?;
            let report = summarize(&results, &self.state);
            report.emit(console);
            Some(report)
        };

        self.teardown(&mut shards);

        let interrupted = self.state.was_interrupted();
        let elapsed = started.elapsed();
        if interrupted {
            console.alert("Interrupted by user");
        } else {
            console.blank();
            console.info(&format!("Done! ({})", format_duration(elapsed)));
        }

        Ok(RunOutcome {
            report,
            interrupted,
            shard_dir: shards.dir().to_path_buf(),
            elapsed,
        })
    }

    fn split(&self) -> Result<ShardSet> {
        let console = &*self.console;
        let size = std::fs::metadata(&self.config.wordlist)
            .map(|m| m.len())
            .unwrap_or(0);

        console.info(&format!(
            "Reading wordlist: {} ({})",
            self.config.wordlist.display(),
            ByteSize(size)
        ));

        let shards = Sharder::new()
            .with_progress(!console.is_quiet())
            .with_temp_root(self.config.temp_dir.clone())
            .split(&self.config.wordlist, self.config.split)?;

        let per_shard = shards.total_lines().div_ceil(self.config.split as u64);
        console.info(&format!("Total lines: {}", format_number(shards.total_lines())));
        console.info(&format!(
            "Splitting into {} parts (~{} lines each)",
            self.config.split,
            format_number(per_shard)
        ));
        for shard in shards.shards() {
            console.created(&format!(
                "Created: {} ({} lines)",
                shard.path.display(),
                format_number(shard.lines)
            ));
        }

        Ok(shards)
    }

    fn dispatch(&self, tasks: &[AttackTask]) -> Result<Vec<AttackResult>> {
        let detector = SuccessDetector::new(self.config.looking_for.as_deref());
        let supervisor = Supervisor::new(Arc::clone(&self.state), Arc::clone(&self.console))
            .with_detector(detector)
            .with_grace(self.config.grace);
        let orchestrator = Orchestrator::new(supervisor, Arc::clone(&self.console));

        if self.config.sequential {
            orchestrator.run_sequential(tasks)
        } else {
            orchestrator.run_parallel(tasks, self.config.max_workers)
        }
    }

    fn print_plan(&self, tasks: &[AttackTask]) {
        let console = &*self.console;
        console.blank();
        console.header("DRY RUN - No attacks will be launched");
        for task in tasks {
            console.plain(&format!("  #{}: {}", task.number(), task.command));
        }
    }

    fn teardown(&self, shards: &mut ShardSet) {
        if let Err(e) = shards.cleanup() {
            self.console.alert(&format!("Warning: {}", e));
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::SplitError;
    use crate::output::MemorySink;
    use crate::state::CancelReason;
    use crate::supervisor::interrupt_run;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn wordlist(lines: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..lines {
            writeln!(file, "pass{}", i).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn runner(config: RunConfig) -> (Runner, MemorySink) {
        let sink = MemorySink::new();
        let console = Arc::new(Console::new(true).with_sink(Box::new(sink.clone())));
        (Runner::with_console(config, console), sink)
    }

    #[test]
    fn test_parallel_run_end_to_end() {
        let list = wordlist(10);
        let root = tempfile::TempDir::new().unwrap();
        let mut config = RunConfig::new("cat <%WORDLIST%>", list.path(), 3);
        config.grace = Duration::from_millis(500);
        config.temp_dir = Some(root.path().to_path_buf());
        let (runner, sink) = runner(config);

        let outcome = runner.run().unwrap();
        let report = outcome.report.as_ref().unwrap();
        assert_eq!(outcome.shard_dir.parent(), Some(root.path()));

        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 3);
        assert!(!outcome.shard_dir.exists());

        let lines = sink.lines();
        let mut words: Vec<&str> = lines
            .iter()
            .filter(|l| l.starts_with("[#"))
            .map(|l| l.split_once(' ').unwrap().1)
            .collect();
        words.sort();
        let mut expected: Vec<String> = (0..10).map(|i| format!("pass{}", i)).collect();
        expected.sort();
        assert_eq!(words, expected);
        assert!(lines
            .iter()
            .any(|l| l.starts_with("[+] Created: ") && l.ends_with("wordlist_part_1.txt (4 lines)")));
    }

    #[test]
    fn test_success_string_stops_run() {
        let list = wordlist(9);
        let mut config = RunConfig::new(
            "if grep -q pass2 <%WORDLIST%>; then sleep 0.5; echo FOUND it; fi; sleep 30",
            list.path(),
            3,
        );
        config.looking_for = Some("FOUND".to_string());
        config.max_workers = Some(3);
        config.grace = Duration::from_millis(500);
        let (runner, sink) = runner(config);

        let started = Instant::now();
        let outcome = runner.run().unwrap();

        assert!(started.elapsed() < Duration::from_secs(15));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            runner.state().reason(),
            Some(CancelReason::SuccessFound {
                index: 2,
                needle: "FOUND".to_string()
            })
        );
        assert!(sink
            .lines()
            .contains(&"[!] ALL ATTACKS STOPPED - Success string 'FOUND' was found!".to_string()));
        assert!(!outcome.shard_dir.exists());
    }

    #[test]
    fn test_interrupt_tears_down() {
        let list = wordlist(4);
        let mut config = RunConfig::new("sleep 30 # <%WORDLIST%>", list.path(), 2);
        config.sequential = true;
        config.grace = Duration::from_millis(500);
        let (runner, _) = runner(config);

        let state = runner.state();
        let console = runner.console();
        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            interrupt_run(&state, Duration::from_millis(500), &console)
        });

        let outcome = runner.run().unwrap();
        assert!(interrupter.join().unwrap());

        assert!(outcome.interrupted);
        assert_eq!(outcome.exit_code(), INTERRUPTED_EXIT_CODE);
        assert_eq!(outcome.report.as_ref().unwrap().total(), 1);
        assert!(!outcome.shard_dir.exists());
    }

    #[test]
    fn test_dry_run_launches_nothing() {
        let list = wordlist(4);
        let mut config = RunConfig::new("cat <%WORDLIST%>", list.path(), 2);
        config.dry_run = true;
        let (runner, sink) = runner(config);

        let outcome = runner.run().unwrap();

        assert!(outcome.report.is_none());
        assert!(!outcome.shard_dir.exists());
        assert!(sink.lines().iter().all(|l| !l.starts_with("[*] Starting attack")));
        assert_eq!(sink.lines().iter().filter(|l| l.starts_with("  #")).count(), 2);
    }

    #[test]
    fn test_missing_wordlist_is_not_found() {
        let config = RunConfig::new("cat <%WORDLIST%>", "/no/such/wordlist.txt", 2);
        let (runner, _) = runner(config);
        assert!(matches!(runner.run(), Err(SplitError::NotFound(_))));
    }

    #[test]
    fn test_missing_placeholder_creates_nothing() {
        let list = wordlist(4);
        let root = tempfile::TempDir::new().unwrap();
        let mut config = RunConfig::new("cat list.txt", list.path(), 2);
        config.temp_dir = Some(root.path().to_path_buf());
        let (runner, sink) = runner(config);

        assert!(matches!(runner.run(), Err(SplitError::Config(_))));
        assert!(sink.lines().is_empty());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_interrupt_after_success_string_still_tears_down() {
        let list = wordlist(6);
        let root = tempfile::TempDir::new().unwrap();
        let mut config = RunConfig::new(
            "trap '' TERM; if grep -q pass1 <%WORDLIST%>; then echo FOUND; fi; sleep 30",
            list.path(),
            2,
        );
        config.looking_for = Some("FOUND".to_string());
        config.max_workers = Some(2);
        config.grace = Duration::from_secs(1);
        config.temp_dir = Some(root.path().to_path_buf());
        let (runner, sink) = runner(config);

        let state = runner.state();
        let console = runner.console();
        let interrupter = std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !state.is_cancelled() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }
            // Ctrl+C during the grace period of the success teardown
            let first = interrupt_run(&state, Duration::from_secs(1), &console);
            let second = interrupt_run(&state, Duration::from_secs(1), &console);
            (first, second)
        });

        let outcome = runner.run().unwrap();
        let (first, second) = interrupter.join().unwrap();

        assert!(first, "first interrupt must go through the normal teardown");
        assert!(!second);
        assert!(outcome.interrupted);
        assert_eq!(outcome.exit_code(), INTERRUPTED_EXIT_CODE);
        assert!(matches!(
            runner.state().reason(),
            Some(CancelReason::SuccessFound { index: 1, .. })
        ));
        assert!(!outcome.shard_dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
        assert!(sink.lines().contains(&"[!] Interrupted by user".to_string()));
    }

    #[test]
    fn test_output_file_mirrors_console() {
        let list = wordlist(2);
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("run.log");

        let mut config = RunConfig::new("echo hello from <%WORDLIST%>", list.path(), 2);
        config.quiet = true;
        config.output = Some(log_path.clone());
        let runner = Runner::new(config);
        runner.run().unwrap();

        // Closed at the end of the run
        assert!(!runner.console().close_sink());
        runner.console().info("after the run");

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("[#1] hello from "));
        assert!(content.contains("  Attack Summary"));
        assert!(content.contains("[✓] Successful: 2"));
        assert!(!content.contains("after the run"));
    }
}
