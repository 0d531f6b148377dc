//! `taskdeck` — command-line task list.
//!
//! Talks to the task API through the optimistic cache, then prints the
//! filtered list. Configuration via CLI flags, environment variables, or
//! config file (`~/.config/taskdeck/config.toml`).
//!
//! ```bash
//! # List tasks from a local API
//! cargo run --bin taskdeck -- --api-url http://127.0.0.1:5173 list --sort name
//!
//! # Try it without a server
//! cargo run --bin taskdeck -- --offline add "Buy milk" "Two litres"
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use taskdeck::config::{CliArgs, ClientConfig, Command, ListArgs};
use taskdeck::filter::FilterPipeline;
use taskdeck::repository::TaskRepository;
use taskdeck::repository::http::HttpRepository;
use taskdeck::repository::memory::InMemoryRepository;
use taskdeck::sync::{MutationOutcome, SyncEvent, TaskCache};
use taskdeck_proto::task::Task;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(api_url = %config.api_url, offline = config.offline, "taskdeck starting");

    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| Command::List(ListArgs::default()));

    let ok = if config.offline {
        run(InMemoryRepository::seeded(), &config, command).await
    } else {
        match HttpRepository::new(&config.api_url, config.request_timeout) {
            Ok(repository) => run(repository, &config, command).await,
            Err(e) => {
                eprintln!("error: {e}");
                false
            }
        }
    };

    tracing::info!(ok, "taskdeck exiting");
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

/// Initialize logging.
///
/// Logs go to stderr unless `file_path` is given, in which case they are
/// written to that file through a non-blocking appender. The returned
/// [`WorkerGuard`] must be held until shutdown so buffered entries are
/// flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((log_dir, file_name)) = file_path.and_then(|p| Some((p.parent()?, p.file_name()?)))
    else {
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Runs one command against `repository`. Returns `false` on any failure.
async fn run<R: TaskRepository + 'static>(
    repository: R,
    config: &ClientConfig,
    command: Command,
) -> bool {
    let (cache, mut events) = TaskCache::new(repository, config.event_buffer);
    cache.refetch().await;

    let state = cache.snapshot();
    if let Some(e) = &state.error {
        eprintln!("error: could not load tasks: {e}");
        return false;
    }

    let (filter, outcome) = match command {
        Command::List(args) => (args.apply_to(&config.default_filter), None),
        Command::Add { title, description } => (
            config.default_filter.clone(),
            Some(cache.create(&title, &description).await),
        ),
        Command::Done { id } => (
            config.default_filter.clone(),
            Some(cache.set_status(id, true).await),
        ),
        Command::Reopen { id } => (
            config.default_filter.clone(),
            Some(cache.set_status(id, false).await),
        ),
        Command::Rm { id } => (
            config.default_filter.clone(),
            Some(cache.remove(id).await),
        ),
    };

    let failed = drain_events(&mut events);
    match outcome {
        Some(MutationOutcome::Skipped) => {
            eprintln!("error: nothing changed; title and description must not be blank");
        }
        Some(MutationOutcome::Aborted) => eprintln!("error: request did not complete"),
        _ => {}
    }

    let state = cache.snapshot();
    let visible = FilterPipeline::new(config.search).apply(state.tasks(), &filter);
    if let Err(e) = print_tasks(&visible) {
        tracing::warn!(error = %e, "failed to write task list");
        return false;
    }

    !failed && matches!(outcome, None | Some(MutationOutcome::Applied))
}

/// Prints every pending notification. Returns whether there were any.
fn drain_events(rx: &mut mpsc::Receiver<SyncEvent>) -> bool {
    let mut any = false;
    while let Ok(event) = rx.try_recv() {
        eprintln!("{}", event.message());
        any = true;
    }
    any
}

fn print_tasks(tasks: &[Task]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if tasks.is_empty() {
        writeln!(out, "no tasks")?;
    }
    for task in tasks {
        let mark = if task.completed { 'x' } else { ' ' };
        writeln!(out, "[{mark}] {:>14}  {}", task.id.to_string(), task.title)?;
        writeln!(out, "    {:>14}  {}", "", task.description)?;
    }
    out.flush()
}
