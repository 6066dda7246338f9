//! Ralph - loop a coding agent over a fixed prompt until it declares done.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ralph::config::ConfigLoader;
use ralph::supervisor::RunLoop;
use ralph::{agent, display, prompt, session};

#[derive(Parser, Debug)]
#[command(
    name = "ralph",
    about = "Loop a coding agent over a fixed prompt until it declares done",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the agent loop.
    Run {
        /// Context files fed to the agent each iteration.
        #[arg(short = 'p', long = "prompt", required = true, num_args = 1..)]
        prompt_files: Vec<PathBuf>,
        /// Agent backend to run.
        #[arg(short, long)]
        agent: Option<String>,
        /// Maximum iterations.
        #[arg(short, long)]
        iterations: Option<u32>,
        /// Working directory for the agent subprocess.
        #[arg(long, default_value = ".")]
        cwd: PathBuf,
        /// Write each iteration log once at the end instead of streaming.
        #[arg(long)]
        no_stream: bool,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            prompt_files,
            agent,
            iterations,
            cwd,
            no_stream,
        } => {
            if let Err(code) = run(prompt_files, agent, iterations, cwd, no_stream).await {
                std::process::exit(code);
            }
        }
    }
}

async fn run(
    prompt_files: Vec<PathBuf>,
    agent_name: Option<String>,
    iterations: Option<u32>,
    cwd: PathBuf,
    no_stream: bool,
) -> Result<(), i32> {
    let config = ConfigLoader::new().load_or_default();
    let agent_name = agent_name.unwrap_or_else(|| config.agent.clone());
    let iterations = iterations.unwrap_or(config.iterations);

    if iterations == 0 {
        display::print_error("iterations must be at least 1");
        return Err(1);
    }
    if let Some(missing) = prompt::missing_context_file(&prompt_files) {
        display::print_error(&format!("context file not found: {}", missing.display()));
        return Err(1);
    }
    if !cwd.is_dir() {
        display::print_error(&format!("not a directory: {}", cwd.display()));
        return Err(1);
    }

    let Some(agent) = agent::get_agent(&agent_name, config.binary.clone()) else {
        display::print_error(&format!("unknown agent: {agent_name}"));
        return Err(1);
    };

    let prompt = prompt::build_prompt(&prompt_files).map_err(|err| {
        display::print_error(&err.to_string());
        1
    })?;

    let sessions = session::sessions_dir().map_err(|err| {
        display::print_error(&err.to_string());
        1
    })?;
    let (_meta, session_dir) =
        session::create_session(&sessions, &agent_name, iterations, &cwd, &prompt_files)
            .map_err(|err| {
                display::print_error(&err.to_string());
                1
            })?;

    display::print_run_header(&agent_name, iterations, &session_dir);

    let run_loop = RunLoop {
        agent,
        prompt,
        cwd,
        log_dir: session_dir,
        iterations,
        flush_interval: Duration::from_millis(config.flush_interval_ms),
        stream_logs: !no_stream,
        echo: true,
    };

    match run_loop.run().await {
        Ok(outcome) => {
            display::print_summary(outcome.iterations_run, outcome.completed);
            Ok(())
        }
        Err(err) => {
            display::print_error(&err.to_string());
            Err(1)
        }
    }
}
