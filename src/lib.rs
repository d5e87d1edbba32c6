//! # Brute Splitter
//!
//! Splits bruteforce attacks into multiple sub-attacks over wordlist shards.
//!
//! ## Features
//!
//! - **Round-robin sharding**: line `i` of the wordlist lands in shard `i % N`
//! - **Any tool**: the command is a template, the shard path replaces a placeholder
//! - **Parallel or sequential**: bounded worker pool, or one attack at a time
//! - **Auto-stop**: the first output line containing the success string stops every attack
//! - **Log mirroring**: every console line can be copied to a file
//!
//! ## Usage
//!
//! ```bash
//! # Hydra SSH bruteforce in 5 parallel parts
//! brute-splitter -c "hydra -L users.txt -P <%WORDLIST%> ssh://192.168.1.100" -w rockyou.txt -s 5
//!
//! # Stop everything as soon as a login succeeds
//! brute-splitter -c "netexec smb 10.10.10.10 -u users.txt -p <%WORDLIST%>" -w pass.txt -s 10 --lf "STATUS_LOGON_SUCCESS"
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use brute_splitter::cli::RunConfig;
//! use brute_splitter::runner::Runner;
//!
//! let mut config = RunConfig::new("john --wordlist=<%WORDLIST%> hash.txt", "wordlist.txt", 8);
//! config.looking_for = Some("Session completed".to_string());
//!
//! let runner = Runner::new(config);
//! // let outcome = runner.run().unwrap();
//! ```

pub mod cli;
pub mod command;
pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod report;
pub mod runner;
pub mod shard;
pub mod state;
pub mod supervisor;

pub use cli::{Args, RunConfig};
pub use error::SplitError;
pub use runner::{RunOutcome, Runner};
