//! Audio focus daemon.
//!
//! Reads engine commands from a JSON script, or as one JSON object per line
//! on stdin, and prints every engine event as a JSON line on stdout.

mod script;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiofocus_engine::{create_engine, EngineConfig, FocusError};
use audiofocus_ipc::{EngineCommand, EngineEvent};

use crate::script::Script;

#[derive(Parser, Debug)]
#[command(name = "focusd", about = "Audio interrupt and focus arbitration daemon")]
struct Cli {
    /// Engine configuration (JSON). Defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario script to run instead of reading commands from stdin
    #[arg(long)]
    script: Option<PathBuf>,

    /// Log everything at trace level
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "trace"
    } else {
        "focusd=info,audiofocus_engine=debug,audiofocus_policy=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("Starting focusd");

    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    // Create IPC channels
    let (command_tx, command_rx) =
        audiofocus_ipc::command_channel_with_capacity(config.command_queue_capacity);
    let (event_tx, event_rx) =
        audiofocus_ipc::event_channel_with_capacity(config.event_queue_capacity);

    let input_errors = event_tx.clone();
    let mut engine =
        create_engine(&config, command_rx, event_tx).context("failed to create engine")?;

    // Spawn engine thread
    let engine_thread = thread::Builder::new()
        .name("focus-engine".into())
        .spawn(move || {
            info!("Engine thread starting");
            engine.run();
            info!("Engine thread stopped");
        })
        .context("failed to spawn engine thread")?;

    let printer = thread::spawn(move || print_events(event_rx));

    match &cli.script {
        Some(path) => run_script(Script::from_path(path)?, &command_tx)?,
        None => run_stdin(&command_tx, &input_errors)?,
    }
    drop(command_tx);
    drop(input_errors);

    engine_thread
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;
    let errors = printer
        .join()
        .map_err(|_| anyhow!("event printer panicked"))?;

    info!(errors, "focusd finished");
    Ok(if errors == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn run_script(script: Script, command_tx: &Sender<EngineCommand>) -> Result<()> {
    for command in script.into_commands() {
        command_tx
            .send(command)
            .map_err(|_| anyhow!("engine stopped before the script finished"))?;
    }
    Ok(())
}

/// Malformed lines are reported as parameter-type errors and skipped.
fn run_stdin(command_tx: &Sender<EngineCommand>, errors: &Sender<EngineEvent>) -> Result<()> {
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(error) => {
                warn!(%error, "Ignoring malformed command");
                let _ = errors.send(EngineEvent::Error {
                    request_id: None,
                    code: error.code(),
                    message: error.to_string(),
                });
                continue;
            }
        };

        let shutdown = matches!(command, EngineCommand::Shutdown);
        if command_tx.send(command).is_err() {
            warn!("Engine stopped, no longer reading commands");
            break;
        }
        if shutdown {
            break;
        }
    }
    Ok(())
}

fn parse_command(line: &str) -> Result<EngineCommand, FocusError> {
    serde_json::from_str(line).map_err(|e| FocusError::ParameterType(e.to_string()))
}

/// Print events until every sender is gone. Returns the number of error events.
fn print_events(event_rx: Receiver<EngineEvent>) -> usize {
    let mut errors = 0;

    for event in event_rx.iter() {
        debug!(?event, "Engine event");
        if let EngineEvent::Error { code, message, .. } = &event {
            warn!(?code, %message, "Command failed");
            errors += 1;
        }

        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to encode event: {}", e),
        }
    }

    errors
}
