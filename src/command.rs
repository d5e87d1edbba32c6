//! Command templates
//!
//! A template is any shell command containing a placeholder token. Each
//! occurrence of the token is replaced with a shard path, verbatim: nothing
//! is quoted or escaped.

use crate::error::{Result, SplitError};
use crate::shard::ShardSet;

use std::path::{Path, PathBuf};

/// Placeholder used when none is given
pub const DEFAULT_PLACEHOLDER: &str = "<%WORDLIST%>";

/// Check that `placeholder` is usable and appears in `template`
pub fn validate(template: &str, placeholder: &str) -> Result<()> {
    if placeholder.is_empty() {
        return Err(SplitError::config("The placeholder must not be empty"));
    }
    if !template.contains(placeholder) {
        return Err(SplitError::config(format!(
            "The placeholder '{}' is not present in the command: {}",
            placeholder, template
        )));
    }
    Ok(())
}

/// Replace every occurrence of `placeholder` in `template` with `shard_path`
pub fn instantiate(template: &str, placeholder: &str, shard_path: &Path) -> Result<String> {
    validate(template, placeholder)?;
    Ok(template.replace(placeholder, &shard_path.to_string_lossy()))
}

/// One shard paired with its ready-to-run command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackTask {
    pub index: usize,
    pub shard: PathBuf,
    pub command: String,
}

impl AttackTask {
    /// Number shown to the operator (1-based)
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Build one task per shard, in shard order
pub fn build_tasks(shards: &ShardSet, template: &str, placeholder: &str) -> Result<Vec<AttackTask>> {
    shards
        .shards()
        .iter()
        .map(|shard| {
            Ok(AttackTask {
                index: shard.index,
                shard: shard.path.clone(),
                command: instantiate(template, placeholder, &shard.path)?,
            })
        })
        .collect()
}
