//! toolsweep CLI
//!
//! Entry point for the `toolsweep` command-line tool.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;
use uuid::Uuid;

use toolsweep::config::{ConfigOverrides, EffectiveConfig, DEFAULT_CONFIG_FILE};
use toolsweep::driver::{Driver, Progress};
use toolsweep::failure_log::FailureLog;
use toolsweep::invoker::{Invoker, Status};
use toolsweep::records::load_records;
use toolsweep::signal::{SignalHandler, EXIT_CODE_INTERRUPTED};
use toolsweep::summary::RunReport;
use toolsweep::telemetry::init_tracing;
use toolsweep_runner::NativeRunner;

#[derive(Parser)]
#[command(name = "toolsweep")]
#[command(about = "Run a command-line tool once per record and bucket its failures", version)]
struct Cli {
    /// Debug-level diagnostics on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Diagnostics as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Path to config file (default: ./toolsweep.toml if present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Record list, one per line
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Failure log path
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Directory the tool runs in
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Deadline per record in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Bound on waiting for a killed tool in milliseconds
    #[arg(long)]
    reap_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every record and print the summary
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the final report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Print the effective configuration and exit
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the error signature for captured tool output
    Extract {
        /// File with the output (default: stdin)
        file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.log_json, level);

    match cli.command {
        Commands::Run {
            config,
            json,
            summary_json,
        } => run_batch(config, json, summary_json),
        Commands::CheckConfig { config } => run_check_config(config),
        Commands::Extract { file } => run_extract(file),
    }
}

fn load_config(args: ConfigArgs) -> EffectiveConfig {
    let file = args.config.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let overrides = ConfigOverrides {
        input: args.input,
        log_path: args.log_path,
        working_dir: args.working_dir,
        timeout_ms: args.timeout_ms,
        reap_timeout_ms: args.reap_timeout_ms,
    };

    match EffectiveConfig::build(file.as_deref(), &overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn run_check_config(args: ConfigArgs) {
    let effective = load_config(args);
    match effective.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_extract(file: Option<PathBuf>) {
    let output = match read_input(file.as_deref()) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading output: {}", e);
            process::exit(1);
        }
    };
    let raw = toolsweep_signature::extract(&output);
    println!("Extracted: {}", raw);
    println!("Bucket:    {}", toolsweep_signature::normalize(&raw));
}

fn read_input(file: Option<&Path>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn run_batch(args: ConfigArgs, json: bool, summary_json: Option<PathBuf>) {
    let config = load_config(args).config;

    let records = match load_records(&config.input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error loading records: {}", e);
            process::exit(1);
        }
    };

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let mut log = match FailureLog::create(&config.log_path, &run_id) {
        Ok(l) => l,
        Err(e) => {
            eprintln!(
                "Error creating failure log {}: {}",
                config.log_path.display(),
                e
            );
            process::exit(1);
        }
    };

    let handler = SignalHandler::new();
    if let Err(e) = handler.install() {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }

    let timeouts = config.timeouts();
    tracing::info!(
        run_id = %run_id,
        records = records.len(),
        timeout_ms = timeouts.timeout_ms,
        "starting run"
    );
    if !json {
        println!(
            "Processing {} records (timeout {} ms, run {})",
            records.len(),
            timeouts.timeout_ms,
            run_id
        );
    }

    let invoker = Invoker::new(
        NativeRunner::new(),
        config.template(),
        &config.working_dir,
        timeouts,
    );
    let driver = Driver::new(invoker).with_signals(handler.state());
    let result = driver.run(&records, &mut log, |p| print_progress(&p, json));

    let report = RunReport::new(
        run_id,
        started_at,
        timeouts.timeout_ms,
        records.len() as u64,
        result.interrupted,
        log.path().to_path_buf(),
        result.aggregator.report(),
    );

    if let Some(ref path) = summary_json {
        if let Err(e) = report.write_to_file(path) {
            eprintln!("Error writing summary {}: {}", path.display(), e);
        }
    }

    if json {
        match report.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!();
        print!("{}", report.to_human());
    }

    if result.interrupted {
        process::exit(EXIT_CODE_INTERRUPTED);
    }
}

/// One line per record; stderr when stdout carries JSON.
fn print_progress(p: &Progress<'_>, json: bool) {
    let outcome = p.outcome;
    let mut line = format!(
        "[{}/{}] {} ... {} ({:.1} ms)",
        p.index,
        p.total,
        outcome.record(),
        outcome.status().as_str(),
        outcome.elapsed().as_secs_f64() * 1000.0
    );
    if outcome.status() != Status::Success {
        line.push_str(" - ");
        line.push_str(outcome.signature());
    }
    if json {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}
