//! Console output
//!
//! All user-facing lines go through [`Console`], which serializes writers so
//! that lines from concurrent attacks never interleave mid-line, and mirrors
//! each line to the optional [`LogSink`].

use crate::output::LogSink;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Width of the `=` rules around section headers
const RULE_WIDTH: usize = 70;

/// Kind of console line, decides marker, color and stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// `[*]` general progress
    Info,
    /// `[+]` a resource was created
    Created,
    /// `[✓]` something finished cleanly
    Success,
    /// `[!]` attention: non-zero exits, success strings, warnings
    Alert,
    /// `[✗]` errors, written to stderr
    Error,
    /// `[✗]` failed attacks, written to stdout
    Failure,
    /// `[>]` the command about to be launched
    Command,
    /// `[#N]` one line of child output, N is the 0-based task index
    Output(usize),
    /// No marker
    Plain,
}

impl Level {
    fn marker(self) -> String {
        match self {
            Level::Info => "[*]".to_string(),
            Level::Created => "[+]".to_string(),
            Level::Success => "[✓]".to_string(),
            Level::Alert => "[!]".to_string(),
            Level::Error | Level::Failure => "[✗]".to_string(),
            Level::Command => "[>]".to_string(),
            Level::Output(index) => format!("[#{}]", index + 1),
            Level::Plain => String::new(),
        }
    }

    fn paint(self, marker: &str) -> ColoredString {
        match self {
            Level::Info => marker.cyan(),
            Level::Created | Level::Success => marker.green(),
            Level::Alert => marker.yellow().bold(),
            Level::Error => marker.red().bold(),
            Level::Failure => marker.red(),
            Level::Command => marker.bright_black(),
            Level::Output(_) => marker.bright_green(),
            Level::Plain => marker.normal(),
        }
    }

    /// Lines hidden from stdout in quiet mode (the sink still gets them)
    fn is_chatter(self) -> bool {
        matches!(
            self,
            Level::Info | Level::Created | Level::Command | Level::Output(_)
        )
    }
}

/// Render a line without color, as it is written to the sink
pub fn plain_line(level: Level, text: &str) -> String {
    let marker = level.marker();
    if marker.is_empty() {
        text.to_string()
    } else {
        format!("{} {}", marker, text)
    }
}

/// Serialized console writer with an optional mirror sink
pub struct Console {
    sink: Mutex<Option<Box<dyn LogSink>>>,
    quiet: bool,
}

impl Console {
    pub fn new(quiet: bool) -> Self {
        Self {
            sink: Mutex::new(None),
            quiet,
        }
    }

    /// Attach the mirror sink
    pub fn with_sink(self, sink: Box<dyn LogSink>) -> Self {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
        self
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Detach and close the mirror sink. Returns `false` if none was attached.
    pub fn close_sink(&self) -> bool {
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        sink.is_some()
    }

    /// Emit one line. Console and sink are written under the same lock.
    pub fn emit(&self, level: Level, text: &str) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);

        if !(self.quiet && level.is_chatter()) {
            let marker = level.marker();
            let rendered = if marker.is_empty() {
                text.to_string()
            } else {
                format!("{} {}", level.paint(&marker), text)
            };

            // Broken pipes on stdout are not worth aborting an attack for
            if level == Level::Error {
                let _ = writeln!(std::io::stderr().lock(), "{}", rendered);
            } else {
                let _ = writeln!(std::io::stdout().lock(), "{}", rendered);
            }
        }

        if let Some(writer) = sink.as_mut() {
            if let Err(e) = writer.write_line(&plain_line(level, text)) {
                log::warn!("disabling output file after write failure: {}", e);
                *sink = None;
            }
        }
    }

    pub fn info(&self, text: &str) {
        self.emit(Level::Info, text);
    }

    pub fn created(&self, text: &str) {
        self.emit(Level::Created, text);
    }

    pub fn success(&self, text: &str) {
        self.emit(Level::Success, text);
    }

    pub fn alert(&self, text: &str) {
        self.emit(Level::Alert, text);
    }

    pub fn error(&self, text: &str) {
        self.emit(Level::Error, text);
    }

    pub fn command(&self, text: &str) {
        self.emit(Level::Command, text);
    }

    pub fn output(&self, index: usize, text: &str) {
        self.emit(Level::Output(index), text);
    }

    pub fn plain(&self, text: &str) {
        self.emit(Level::Plain, text);
    }

    pub fn blank(&self) {
        self.emit(Level::Plain, "");
    }

    /// Section header framed by `=` rules
    pub fn header(&self, title: &str) {
        let rule = "=".repeat(RULE_WIDTH);
        self.plain(&rule);
        self.plain(&format!("  {}", title));
        self.plain(&rule);
    }
}

/// Print the application banner
pub fn print_banner() {
    let banner = r#"
╔══════════════════════════════════════════════════════════════════════╗
║                                                                      ║
║   ██████╗ ██████╗ ██╗   ██╗████████╗███████╗                         ║
║   ██╔══██╗██╔══██╗██║   ██║╚══██╔══╝██╔════╝                         ║
║   ██████╔╝██████╔╝██║   ██║   ██║   █████╗                           ║
║   ██╔══██╗██╔══██╗██║   ██║   ██║   ██╔══╝                           ║
║   ██████╔╝██║  ██║╚██████╔╝   ██║   ███████╗                         ║
║   ╚═════╝ ╚═╝  ╚═╝ ╚═════╝    ╚═╝   ╚══════╝   SPLITTER              ║
║                                                                      ║
║            Parallel Bruteforce Attacks over Wordlist Shards          ║
║                                                      v1.0.0          ║
╚══════════════════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner.green());
}

/// Create a bytes-based progress bar
pub fn create_bytes_progress_bar(total_bytes: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);

    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.green/dim}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}
