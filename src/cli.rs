//! Command-line interface definition for brute-splitter
//!
//! Provides argument parsing and the validated run configuration.

use crate::command::{self, DEFAULT_PLACEHOLDER};
use crate::error::{Result, SplitError};
use crate::shard::validate_split;
use crate::supervisor::DEFAULT_GRACE;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Split bruteforce attacks into multiple parallel sub-attacks
///
/// Deals a wordlist round-robin into N shards and runs the given command once
/// per shard, substituting the shard path for the placeholder.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "brute-splitter",
    author = "m0h1nd4",
    version,
    about = "Split bruteforce attacks into multiple parallel sub-attacks",
    long_about = r#"
╔══════════════════════════════════════════════════════════════════════╗
║                        BRUTE-SPLITTER v1.0.0                         ║
║              Parallel Bruteforce Attacks over Wordlist Shards        ║
╚══════════════════════════════════════════════════════════════════════╝

Deals a wordlist round-robin into N shards and runs one instance of your
command per shard. Works with john, hashcat, netexec, hydra and anything else
that takes a wordlist path on its command line.

EXAMPLES:
    # NetExec SMB bruteforce
    brute-splitter -c "netexec smb 10.10.10.10 -u users.txt -p <%WORDLIST%>" -w passwords.txt -s 10

    # Hydra SSH bruteforce
    brute-splitter -c "hydra -L users.txt -P <%WORDLIST%> ssh://192.168.1.100" -w rockyou.txt -s 5

    # John the Ripper
    brute-splitter -c "john --wordlist=<%WORDLIST%> hash.txt" -w wordlist.txt -s 8

    # Hashcat
    brute-splitter -c "hashcat -m 0 -a 0 hash.txt <%WORDLIST%>" -w passwords.txt -s 4

    # Sequential mode (one attack at a time)
    brute-splitter -c "netexec smb 10.10.10.10 -u admin -p <%WORDLIST%>" -w pass.txt -s 5 --sequential

    # Auto-stop when success string is found
    brute-splitter -c "netexec smb 10.10.10.10 -u users.txt -p <%WORDLIST%>" -w pass.txt -s 10 --lf "STATUS_LOGON_SUCCESS"
"#,
    after_help = "For more information, visit: https://github.com/m0h1nd4/brute-splitter"
)]
pub struct Args {
    /// Command to execute (use the placeholder where the wordlist path goes)
    #[arg(short, long, required = true, value_name = "COMMAND")]
    pub command: String,

    /// Path to the wordlist to split
    #[arg(short, long, required = true, value_name = "PATH")]
    pub wordlist: PathBuf,

    /// Number of splits to create
    #[arg(short, long, required = true, value_name = "N")]
    pub split: usize,

    /// Placeholder to replace in the command
    #[arg(short, long, value_name = "TOKEN", default_value = DEFAULT_PLACEHOLDER)]
    pub placeholder: String,

    /// Execute attacks sequentially instead of in parallel
    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    /// Maximum number of simultaneous parallel attacks
    #[arg(long, value_name = "NUM")]
    pub max_workers: Option<usize>,

    /// Stop all attacks when this string appears in any output
    #[arg(short = 'l', long, visible_alias = "lf", value_name = "STRING")]
    pub looking_for: Option<String>,

    /// Mirror every log line to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory in which the shard directory is created (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Split the wordlist and print the commands without running them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Quiet mode - only results, alerts and errors
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose mode - debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub command: String,
    pub wordlist: PathBuf,
    pub split: usize,
    pub placeholder: String,
    pub sequential: bool,
    pub max_workers: Option<usize>,
    pub looking_for: Option<String>,
    pub output: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub quiet: bool,
    /// Time a child gets between the stop signal and the kill
    pub grace: Duration,
}

impl RunConfig {
    /// Build and validate the configuration. Touches no files.
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Self {
            command: args.command.clone(),
            wordlist: args.wordlist.clone(),
            split: args.split,
            placeholder: args.placeholder.clone(),
            sequential: args.sequential,
            max_workers: args.max_workers,
            looking_for: args.looking_for.clone().filter(|s| !s.is_empty()),
            output: args.output.clone(),
            temp_dir: args.temp_dir.clone(),
            dry_run: args.dry_run,
            quiet: args.quiet,
            grace: DEFAULT_GRACE,
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults for everything but the three required inputs
    pub fn new(command: impl Into<String>, wordlist: impl Into<PathBuf>, split: usize) -> Self {
        Self {
            command: command.into(),
            wordlist: wordlist.into(),
            split,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            sequential: false,
            max_workers: None,
            looking_for: None,
            output: None,
            temp_dir: None,
            dry_run: false,
            quiet: false,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_split(self.split)?;
        command::validate(&self.command, &self.placeholder)?;
        if self.max_workers == Some(0) {
            return Err(SplitError::config("--max-workers must be >= 1"));
        }
        Ok(())
    }
}
