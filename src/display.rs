//! Colored CLI display utilities for run-loop output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal while the agent loop runs.

use std::io::{self, Write};
use std::path::Path;

use owo_colors::OwoColorize;

/// Print the banner for a new run.
pub fn print_run_header(agent: &str, iterations: u32, session_dir: &Path) {
    println!(
        "{} agent={} iterations={}",
        "[ralph]".magenta().bold(),
        agent.cyan(),
        iterations
    );
    println!(
        "{} logs at {}",
        "[ralph]".magenta().bold(),
        session_dir.display().to_string().dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print the start of one iteration.
pub fn print_iteration_start(iteration: u32, total: u32) {
    println!(
        "{} {}",
        format!("[iteration {}/{total}]", iteration + 1).blue().bold(),
        "starting".dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print a successfully finished iteration.
pub fn print_iteration_done(iteration: u32, duration_ms: u64) {
    println!(
        "{} finished in {duration_ms}ms",
        format!("[iteration {}]", iteration + 1).green().bold()
    );
    let _ = io::stdout().flush();
}

/// Print an iteration that exited non-zero.
pub fn print_iteration_failed(iteration: u32, exit_code: i32) {
    println!(
        "{} exited with code {exit_code}",
        format!("[iteration {}]", iteration + 1).red().bold()
    );
    let _ = io::stdout().flush();
}

/// Echo a formatted stream chunk exactly as it lands in the log.
pub fn print_stream(chunk: &str) {
    print!("{chunk}");
    let _ = io::stdout().flush();
}

/// Echo subprocess stderr in red.
pub fn print_stderr(chunk: &str) {
    print!("{}", chunk.red());
    let _ = io::stdout().flush();
}

/// Print the end-of-run summary.
pub fn print_summary(iterations_run: u32, completed: bool) {
    if completed {
        println!(
            "{} task complete after {iterations_run} iteration(s)",
            "[done]".green().bold()
        );
    } else {
        println!(
            "{} iteration limit reached after {iterations_run} iteration(s)",
            "[done]".yellow().bold()
        );
    }
    let _ = io::stdout().flush();
}

/// Print a notice that a termination signal was received.
pub fn print_interrupted(signal: &str) {
    println!("\n{} received {signal}, stopping", "[signal]".yellow().bold());
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[error]".red().bold(), message);
    let _ = io::stdout().flush();
}
