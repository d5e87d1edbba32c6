//! Wordlist sharding
//!
//! Splits a wordlist into N files by dealing lines round-robin: line `idx`
//! goes to shard `idx % n`. Shard sizes differ by at most one line and each
//! shard keeps the relative order of its lines.

use crate::error::{Result, SplitError};
use crate::progress::create_bytes_progress_bar;

use colored::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of the run-scoped temporary directory
pub const SHARD_DIR_PREFIX: &str = "bf_split_";

/// Write buffer per shard file
const SHARD_BUFFER_SIZE: usize = 256 * 1024;

/// Bytes between progress bar updates
const PROGRESS_STEP: u64 = 1024 * 1024;

/// One shard file and the number of lines dealt into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub index: usize,
    pub path: PathBuf,
    pub lines: u64,
}

/// The shard files of one run, backed by a temporary directory.
///
/// The directory is removed by [`ShardSet::cleanup`] or on drop, whichever
/// comes first. Later cleanups are no-ops.
#[derive(Debug)]
pub struct ShardSet {
    dir: Option<TempDir>,
    root: PathBuf,
    shards: Vec<Shard>,
    total_lines: u64,
}

impl ShardSet {
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    /// Directory holding the shards (it may already be removed)
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Remove the shard directory. Idempotent.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        log::debug!("removing shard directory {:?}", self.root);
        dir.close().map_err(|e| {
            SplitError::teardown(format!(
                "could not remove shard directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }
}

impl Drop for ShardSet {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("{}", e);
        }
    }
}

/// Splits wordlists into round-robin shards
pub struct Sharder {
    show_progress: bool,
    temp_root: Option<PathBuf>,
}

impl Sharder {
    pub fn new() -> Self {
        Self {
            show_progress: false,
            temp_root: None,
        }
    }

    /// Create the shard directory under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    /// Show a byte progress bar while dealing lines
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Deal the lines of `input` into `n` shard files in a fresh temp dir
    pub fn split(&self, input: &Path, n: usize) -> Result<ShardSet> {
        validate_split(n)?;
        if !input.is_file() {
            return Err(SplitError::NotFound(input.to_path_buf()));
        }

        let file = File::open(input)?;
        let size = file.metadata()?.len();

        let mut builder = tempfile::Builder::new();
        builder.prefix(SHARD_DIR_PREFIX);
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let root = dir.path().to_path_buf();
        log::debug!("created shard directory {:?}", root);

        let mut writers = Vec::with_capacity(n);
        let mut paths = Vec::with_capacity(n);
        for i in 0..n {
            let path = root.join(format!("wordlist_part_{}.txt", i + 1));
            let shard_file = File::create(&path)?;
            writers.push(BufWriter::with_capacity(SHARD_BUFFER_SIZE, shard_file));
            paths.push(path);
        }

        let mut counts = vec![0u64; n];

        // An empty file cannot be mapped on every platform
        if size > 0 {
            // SAFETY: the mapping is read-only and dropped before returning
            let mmap = unsafe { memmap2::Mmap::map(&file)? };
            let pb = if self.show_progress {
                create_bytes_progress_bar(size, "Splitting...")
            } else {
                indicatif::ProgressBar::hidden()
            };

            let mut position = 0usize;
            let mut reported = 0u64;
            let mut idx = 0usize;

            while position < mmap.len() {
                let remaining = &mmap[position..];
                let line_end = memchr::memchr(b'\n', remaining)
                    .map(|i| i + 1)
                    .unwrap_or(remaining.len());
                let line = &remaining[..line_end];

                let shard = idx % n;
                let writer = &mut writers[shard];
                writer.write_all(line)?;
                if line.last() != Some(&b'\n') {
                    writer.write_all(b"\n")?;
                }
                counts[shard] += 1;

                position += line_end;
                idx += 1;

                if position as u64 - reported >= PROGRESS_STEP {
                    pb.set_position(position as u64);
                    reported = position as u64;
                }
            }

            pb.finish_with_message("Split".green().to_string());
        }

        for writer in writers.iter_mut() {
            writer.flush()?;
        }
        drop(writers);

        let shards: Vec<Shard> = paths
            .into_iter()
            .zip(counts)
            .enumerate()
            .map(|(index, (path, lines))| Shard { index, path, lines })
            .collect();
        let total_lines = shards.iter().map(|s| s.lines).sum();

        Ok(ShardSet {
            dir: Some(dir),
            root,
            shards,
            total_lines,
        })
    }
}

impl Default for Sharder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ensure a split count is usable before touching the filesystem
pub fn validate_split(n: usize) -> Result<()> {
    if n < 1 {
        return Err(SplitError::config("Number of splits must be >= 1"));
    }
    Ok(())
}
