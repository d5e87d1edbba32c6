//! Brute Splitter - parallel bruteforce attacks over wordlist shards
//!
//! Main entry point for the command-line application.

use clap::Parser;
use colored::*;
use std::process;

use brute_splitter::cli::{Args, RunConfig};
use brute_splitter::progress::print_banner;
use brute_splitter::runner::{Runner, INTERRUPTED_EXIT_CODE};
use brute_splitter::supervisor::interrupt_run;

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    } else if !args.quiet {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    match run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            print_error(&format!("Error: {}", e));

            // Print chain of errors
            let mut source = e.source();
            while let Some(err) = source {
                print_error(&format!("  Caused by: {}", err));
                source = err.source();
            }

            process::exit(1);
        }
    }
}

fn run(args: Args) -> anyhow::Result<i32> {
    // Nothing is touched until the arguments are valid
    let config = RunConfig::from_args(&args)?;

    if !args.quiet {
        print_banner();
    }

    let runner = Runner::new(config);
    install_interrupt_handler(&runner)?;

    let outcome = runner.run()?;
    Ok(outcome.exit_code())
}

/// Route Ctrl+C (and SIGTERM) into the same teardown as a found success string
fn install_interrupt_handler(runner: &Runner) -> anyhow::Result<()> {
    let state = runner.state();
    let console = runner.console();
    let grace = runner.grace();

    ctrlc::set_handler(move || {
        console.blank();
        console.alert("Interruption detected. Cleaning up...");

        if !interrupt_run(&state, grace, &console) {
            // Second interrupt while tearing down: leave now
            console.error("Interrupted again, exiting without cleanup");
            process::exit(INTERRUPTED_EXIT_CODE);
        }
    })?;

    Ok(())
}

/// Print a fatal error before any console exists
fn print_error(text: &str) {
    eprintln!("{} {}", "[✗]".red().bold(), text.red());
}
