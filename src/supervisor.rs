//! Child process supervision
//!
//! Runs one [`AttackTask`] as a shell command, streams its merged
//! stdout/stderr line by line to the console, watches for the success string
//! and reports the exit status. Children run in their own process group on
//! Unix so that termination reaches everything the shell started.

use crate::command::AttackTask;
use crate::detector::SuccessDetector;
use crate::error::{Result, SplitError};
use crate::progress::{Console, Level};
use crate::state::{CancelReason, RunState};

use bstr::ByteSlice;
use std::fmt;
use std::io::{BufRead, BufReader, PipeReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Time a child gets to exit after the graceful stop signal
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Status code reported when a command could not be launched
pub const LAUNCH_FAILURE_CODE: i32 = -1;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How an attack ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStatus {
    /// Exited on its own with this code
    Exited(i32),
    /// Killed by this signal
    Signaled(i32),
    /// Never started, or its status could not be collected
    LaunchFailed,
}

impl AttackStatus {
    pub fn from_exit(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return AttackStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return AttackStatus::Signaled(signal);
            }
        }
        AttackStatus::LaunchFailed
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttackStatus::Exited(0))
    }

    /// Single integer view: exit code, `128 + signal`, or the launch sentinel
    pub fn code(&self) -> i32 {
        match *self {
            AttackStatus::Exited(code) => code,
            AttackStatus::Signaled(signal) => 128 + signal,
            AttackStatus::LaunchFailed => LAUNCH_FAILURE_CODE,
        }
    }
}

impl fmt::Display for AttackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackStatus::Exited(code) => write!(f, "return code {}", code),
            AttackStatus::Signaled(signal) => write!(f, "killed by signal {}", signal),
            AttackStatus::LaunchFailed => {
                write!(f, "failed to launch (code {})", LAUNCH_FAILURE_CODE)
            }
        }
    }
}

/// Outcome of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackResult {
    pub index: usize,
    pub status: AttackStatus,
}

impl AttackResult {
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// A launched child, shared between its worker and whoever terminates it
pub struct ProcessHandle {
    index: usize,
    pid: u32,
    child: Mutex<Child>,
}

impl ProcessHandle {
    fn new(index: usize, child: Child) -> Self {
        Self {
            index,
            pid: child.id(),
            child: Mutex::new(child),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn child(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exit status if the child has exited (reaps it; later calls see the same status)
    pub fn try_status(&self) -> std::io::Result<Option<ExitStatus>> {
        self.child().try_wait()
    }

    fn has_exited(&self) -> bool {
        matches!(self.try_status(), Ok(Some(_)))
    }

    /// Ask the child's process group to stop (SIGTERM)
    pub fn signal_stop(&self) -> Result<()> {
        #[cfg(unix)]
        {
            self.signal_group(nix::sys::signal::Signal::SIGTERM)
        }
        #[cfg(not(unix))]
        {
            self.kill_child()
        }
    }

    /// Kill the child's process group outright (SIGKILL)
    pub fn force_kill(&self) -> Result<()> {
        #[cfg(unix)]
        {
            self.signal_group(nix::sys::signal::Signal::SIGKILL)
        }
        #[cfg(not(unix))]
        {
            self.kill_child()
        }
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::errno::Errno;
        use nix::unistd::Pid;

        log::debug!("sending {} to attack #{} (pgid {})", signal, self.index + 1, self.pid);
        match nix::sys::signal::killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(SplitError::teardown(format!(
                "could not send {} to attack #{}: {}",
                signal,
                self.index + 1,
                e
            ))),
        }
    }

    #[cfg(not(unix))]
    fn kill_child(&self) -> Result<()> {
        match self.child().kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(SplitError::teardown(format!(
                "could not kill attack #{}: {}",
                self.index + 1,
                e
            ))),
        }
    }

    /// Graceful stop, then forced kill once `grace` runs out
    pub fn terminate(self: &Arc<Self>, grace: Duration, console: &Console) {
        terminate_all(std::slice::from_ref(self), grace, console);
    }
}

/// Stop every handle: signal all of them, share one grace period, then kill
/// whatever is still alive. Failures are reported as warnings only.
pub fn terminate_all(handles: &[Arc<ProcessHandle>], grace: Duration, console: &Console) {
    let mut pending: Vec<&Arc<ProcessHandle>> = Vec::with_capacity(handles.len());

    for handle in handles {
        if handle.has_exited() {
            continue;
        }
        if let Err(e) = handle.signal_stop() {
            console.alert(&format!("Warning: {}", e));
        }
        pending.push(handle);
    }

    let deadline = Instant::now() + grace;
    while !pending.is_empty() && Instant::now() < deadline {
        pending.retain(|h| !h.has_exited());
        if !pending.is_empty() {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    for handle in pending {
        if handle.has_exited() {
            continue;
        }
        log::debug!("attack #{} ignored the stop signal, killing it", handle.index() + 1);
        if let Err(e) = handle.force_kill() {
            console.alert(&format!("Warning: {}", e));
        }
    }
}

/// Cancel the run and stop every tracked child. Returns `false` if the run
/// was already cancelled, in which case nothing is done.
pub fn cancel_run(state: &RunState, reason: CancelReason, grace: Duration, console: &Console) -> bool {
    match state.cancel(reason) {
        Some(snapshot) => {
            terminate_all(&snapshot, grace, console);
            true
        }
        None => false,
    }
}

/// Handle one operator interrupt. The first cancels the run, unless the
/// success string already did, and stops every tracked child. Any later
/// interrupt returns `false` and does nothing.
pub fn interrupt_run(state: &RunState, grace: Duration, console: &Console) -> bool {
    if state.record_interrupt() > 1 {
        return false;
    }
    if !cancel_run(state, CancelReason::Interrupted, grace, console) {
        log::debug!("interrupt after the run was already cancelled");
    }
    true
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(not(unix))]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

/// Start `command` with stdout and stderr merged into one pipe
fn spawn(index: usize, command: &str) -> std::io::Result<(ProcessHandle, PipeReader)> {
    let (reader, writer) = std::io::pipe()?;

    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn()?;
    // `cmd` still owns the write ends; drop it so the reader sees EOF
    drop(cmd);

    Ok((ProcessHandle::new(index, child), reader))
}

#[cfg(test)]
pub(crate) fn spawn_for_test(index: usize, command: &str) -> (Arc<ProcessHandle>, PipeReader) {
    let (handle, reader) = spawn(index, command).unwrap();
    (Arc::new(handle), reader)
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Runs attack tasks one child at a time
pub struct Supervisor {
    state: Arc<RunState>,
    console: Arc<Console>,
    detector: Option<SuccessDetector>,
    grace: Duration,
}

impl Supervisor {
    pub fn new(state: Arc<RunState>, console: Arc<Console>) -> Self {
        Self {
            state,
            console,
            detector: None,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_detector(mut self, detector: Option<SuccessDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    /// Run one task to completion. Never fails: launch problems become
    /// [`AttackStatus::LaunchFailed`].
    pub fn run(&self, task: &AttackTask) -> AttackResult {
        let console = &*self.console;
        let number = task.number();

        console.blank();
        console.info(&format!("Starting attack #{}", number));
        console.command(&format!("Command: {}", task.command));

        let (handle, reader) = match spawn(task.index, &task.command) {
            Ok((handle, reader)) => (Arc::new(handle), reader),
            Err(source) => {
                let err = SplitError::Launch {
                    index: task.index,
                    source,
                };
                console.error(&format!("Error executing attack #{}: {}", number, err));
                return AttackResult {
                    index: task.index,
                    status: AttackStatus::LaunchFailed,
                };
            }
        };

        if !self.state.register(Arc::clone(&handle)) {
            log::debug!("attack #{} started after cancellation, stopping it", number);
            handle.terminate(self.grace, console);
        }

        if let Err(e) = self.pump(task.index, reader) {
            console.alert(&format!("Warning: {}", e));
            handle.terminate(self.grace, console);
        }

        let status = self.wait(&handle);
        self.state.deregister(task.index);

        match status {
            AttackStatus::Exited(0) => {
                console.success(&format!("Attack #{} completed successfully", number));
            }
            AttackStatus::LaunchFailed => {
                console.emit(
                    Level::Failure,
                    &format!("Attack #{} ended without an exit status", number),
                );
            }
            other => {
                console.alert(&format!("Attack #{} completed with {}", number, other));
            }
        }

        AttackResult {
            index: task.index,
            status,
        }
    }

    /// Forward child output until EOF, a success match, or cancellation
    fn pump(&self, index: usize, reader: PipeReader) -> Result<()> {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(1024);

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| SplitError::Stream { index, source })?;
            if read == 0 {
                break;
            }

            let line = trim_newline(&buf);
            self.console.output(index, &line.to_str_lossy());

            if let Some(detector) = &self.detector {
                if detector.check(line) {
                    self.on_success(index, detector.needle());
                    break;
                }
            }

            if self.state.is_cancelled() {
                break;
            }
        }

        Ok(())
    }

    fn on_success(&self, index: usize, needle: &str) {
        let reason = CancelReason::SuccessFound {
            index,
            needle: needle.to_string(),
        };
        let Some(snapshot) = self.state.cancel(reason) else {
            return;
        };

        let console = &*self.console;
        console.blank();
        console.alert(&format!("SUCCESS STRING FOUND in attack #{}!", index + 1));
        console.alert(&format!("String detected: '{}'", needle));
        console.alert("Stopping all attacks...");

        terminate_all(&snapshot, self.grace, console);
    }

    fn wait(&self, handle: &ProcessHandle) -> AttackStatus {
        loop {
            match handle.try_status() {
                Ok(Some(status)) => return AttackStatus::from_exit(status),
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    self.console.alert(&format!(
                        "Warning: could not collect exit status of attack #{}: {}",
                        handle.index() + 1,
                        e
                    ));
                    return AttackStatus::LaunchFailed;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use std::path::PathBuf;

    fn task(index: usize, command: &str) -> AttackTask {
        AttackTask {
            index,
            shard: PathBuf::from("/unused"),
            command: command.to_string(),
        }
    }

    fn supervisor(needle: Option<&str>) -> (Supervisor, MemorySink) {
        let sink = MemorySink::new();
        let console = Arc::new(Console::new(true).with_sink(Box::new(sink.clone())));
        let supervisor = Supervisor::new(Arc::new(RunState::new()), console)
            .with_detector(SuccessDetector::new(needle))
            .with_grace(Duration::from_millis(500));
        (supervisor, sink)
    }

    #[test]
    fn test_exit_codes() {
        let (sup, _) = supervisor(None);
        assert_eq!(sup.run(&task(0, "true")).status, AttackStatus::Exited(0));
        assert_eq!(sup.run(&task(1, "exit 3")).status, AttackStatus::Exited(3));
        assert_eq!(
            sup.run(&task(2, "definitely-not-a-command-xyz")).status,
            AttackStatus::Exited(127)
        );
        assert_eq!(sup.state().active_count(), 0);
    }

    #[test]
    fn test_stderr_merged_and_tagged() {
        let (sup, sink) = supervisor(None);
        let result = sup.run(&task(4, "echo out; echo err 1>&2; echo done"));
        assert!(result.status.is_success());

        let lines = sink.lines();
        let output: Vec<&String> = lines.iter().filter(|l| l.starts_with("[#5]")).collect();
        assert_eq!(output, vec!["[#5] out", "[#5] err", "[#5] done"]);
        assert!(lines.contains(&"[✓] Attack #5 completed successfully".to_string()));
    }

    #[test]
    fn test_success_string_cancels_and_stops_own_child() {
        let (sup, sink) = supervisor(Some("FOUND"));
        let started = Instant::now();
        let result = sup.run(&task(2, "echo nope; echo 'pass FOUND'; sleep 30"));

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(result.status, AttackStatus::Signaled(15));
        assert_eq!(
            sup.state().reason(),
            Some(CancelReason::SuccessFound {
                index: 2,
                needle: "FOUND".to_string()
            })
        );
        assert!(sink
            .lines()
            .contains(&"[!] SUCCESS STRING FOUND in attack #3!".to_string()));
    }

    #[test]
    fn test_launch_after_cancel_still_launches_then_aborts() {
        // A task dispatched after cancellation is launched and immediately stopped
        let (sup, sink) = supervisor(None);
        sup.state().cancel(CancelReason::Interrupted);

        let started = Instant::now();
        let result = sup.run(&task(0, "echo launched; sleep 30"));

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_ne!(result.status, AttackStatus::LaunchFailed);
        assert!(!result.status.is_success());
        assert!(sink.lines().iter().any(|l| l.starts_with("[*] Starting attack #1")));
    }

    #[test]
    fn test_terminate_escalates_to_kill() {
        let sink = MemorySink::new();
        let console = Console::new(true).with_sink(Box::new(sink));
        let (handle, _reader) = spawn_for_test(0, "trap '' TERM; sleep 30");
        std::thread::sleep(Duration::from_millis(200));

        handle.terminate(Duration::from_millis(300), &console);

        let deadline = Instant::now() + Duration::from_secs(5);
        let status = loop {
            if let Some(status) = handle.try_status().unwrap() {
                break status;
            }
            assert!(Instant::now() < deadline, "child survived SIGKILL");
            std::thread::sleep(POLL_INTERVAL);
        };
        assert_eq!(AttackStatus::from_exit(status), AttackStatus::Signaled(9));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(AttackStatus::Exited(0).to_string(), "return code 0");
        assert_eq!(AttackStatus::Signaled(15).to_string(), "killed by signal 15");
        assert_eq!(AttackStatus::LaunchFailed.code(), LAUNCH_FAILURE_CODE);
        assert_eq!(AttackStatus::Signaled(9).code(), 137);
    }
}
