//! Error types for the splitter
//!
//! `Config` and `NotFound` are fatal and stop the run before anything is
//! launched. `Launch`, `Stream` and `Teardown` are recovered where they
//! happen and only ever surface as console warnings.

use std::path::PathBuf;
use thiserror::Error;

/// All failures produced by the library
#[derive(Debug, Error)]
pub enum SplitError {
    /// Invalid command-line input
    #[error("{0}")]
    Config(String),

    /// Wordlist does not exist
    #[error("Wordlist not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Operation called in the wrong phase of a run
    #[error("{0}")]
    State(String),

    /// Child process could not be started
    #[error("failed to launch attack #{}: {source}", .index + 1)]
    Launch {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Reading child output failed mid-stream
    #[error("failed to read output of attack #{}: {source}", .index + 1)]
    Stream {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Process kill or temp removal failed
    #[error("teardown: {0}")]
    Teardown(String),

    /// Worker pool could not be built
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SplitError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn teardown(msg: impl Into<String>) -> Self {
        Self::Teardown(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;
