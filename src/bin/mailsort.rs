use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use mailsort::config::Config;
use mailsort::driver::{self, parse_duration, Job, PollOptions};
use mailsort::logging::{self, LogConfig, LogLevel};

/// Sorts IMAP mailboxes with rule-based filters.
#[derive(Debug, Parser)]
#[command(name = "mailsort", version, about)]
struct Args {
    /// TOML file or directory of TOML files.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/")]
    config: PathBuf,

    /// trace, debug, info, warn or error. `trace` logs the IMAP traffic, passwords included.
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Log one JSON object per line.
    #[arg(short = 'j', long, env = "LOG_JSON")]
    log_json: bool,

    /// Pause between passes, e.g. `30s`, `5m` or `500ms`.
    #[arg(short = 'i', long, env = "POLL_INTERVAL", default_value = "5s", value_parser = parse_duration)]
    poll_interval: Duration,

    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,
}

fn run(args: &Args) -> mailsort::Result<()> {
    let config = Config::load(&args.config)?;
    let mut jobs = Job::from_config(&config)?;
    info!(
        accounts = jobs.len(),
        interval = ?args.poll_interval,
        once = args.once,
        "starting"
    );
    let options = PollOptions {
        interval: args.poll_interval,
        once: args.once,
        ..PollOptions::default()
    };
    driver::run(&mut jobs, &options)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = match logging::init(&LogConfig {
        level: args.log_level,
        json: args.log_json,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("mailsort: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            eprintln!("mailsort: {}", e);
            ExitCode::FAILURE
        }
    }
}
