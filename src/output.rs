//! Persistent log sinks
//!
//! Every console line can be mirrored to a sink. Sinks flush after each line
//! so the file stays complete even if the process is interrupted.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Destination for mirrored log lines
pub trait LogSink: Send {
    /// Write one line (without trailing newline) and flush it
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;
}

/// File-backed sink, created or truncated on open
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// In-memory sink, shared with the caller for inspection
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| std::io::Error::other("memory sink poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_flushes_each_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.log");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_line("[*] first").unwrap();

        // Visible on disk before the sink is dropped
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[*] first\n");

        sink.write_line("[*] second").unwrap();
        drop(sink);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[*] first\n[*] second\n"
        );
    }

    #[test]
    fn test_file_sink_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.log");
        std::fs::write(&path, "stale content\n").unwrap();

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_line("fresh").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_memory_sink_shared() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_line("a").unwrap();
        writer.write_line("b").unwrap();

        assert_eq!(sink.lines(), vec!["a", "b"]);
    }
}
