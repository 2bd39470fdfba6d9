//! CLI entrypoint for Decisional Middleware
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use middleware_application::{
    NoProgress, NoTraceRecorder, ProgressNotifier, RunOrchestrationUseCase, TraceRecorder,
};
use middleware_domain::{CaseInput, Severity, StructuredHints, has_errors};
use middleware_infrastructure::{ConfigLoader, FileConfig, JsonlTraceRecorder, OpenAiGateway};
use middleware_presentation::{
    Cli, ConsoleFormatter, OutputFormat, ProgressReporter, SimpleProgress,
};
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "decisional-middleware.log";

fn init_tracing(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Error => eprintln!("config error: {}", issue.message),
            Severity::Warning => eprintln!("config warning: {}", issue.message),
        }
    }
    if has_errors(&issues) {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        bail!("Configuration has {} error(s); aborting", errors);
    }
    Ok(config)
}

fn read_case(cli: &Cli) -> Result<CaseInput> {
    let transcript = match &cli.transcript {
        Some(path) if !cli.reads_stdin() => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read transcript from stdin")?;
            buffer
        }
    };

    let mut input = CaseInput::new(transcript);
    if let Some(path) = &cli.hints {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read hints {}", path.display()))?;
        let hints: StructuredHints = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid hints JSON in {}", path.display()))?;
        input = input.with_hints(hints);
    }
    Ok(input)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_dir.as_deref());

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    info!("Starting Decisional Middleware");

    let config = load_config(&cli)?;
    ConsoleFormatter::set_color(config.output.color);
    let input = read_case(&cli)?;

    // === Dependency Injection ===
    let registry = Arc::new(config.to_registry()?);
    let strategies = Arc::new(config.to_strategy_table()?);
    let api_key = config.gateway.resolve_api_key().ok_or_else(|| {
        anyhow!(
            "No API key: set gateway.api_key or ${}",
            config.gateway.api_key_env
        )
    })?;
    let gateway = Arc::new(OpenAiGateway::new(
        &config.gateway.base_url,
        api_key,
        Duration::from_secs(config.gateway.request_timeout_secs),
    )?);

    let trace_path = config.trace.resolved_path();
    let jsonl = trace_path.as_deref().and_then(|p| JsonlTraceRecorder::new(p));
    let recorder: Arc<dyn TraceRecorder> = match jsonl {
        Some(recorder) => {
            info!("Recording traces to {}", recorder.path().display());
            Arc::new(recorder)
        }
        None => Arc::new(NoTraceRecorder),
    };

    let cancellation = CancellationToken::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            ctrl_c_token.cancel();
        }
    });

    let use_case =
        RunOrchestrationUseCase::new(gateway, registry, strategies, config.to_analyzer())
            .with_recorder(recorder)
            .with_params(config.to_execution_params())
            .with_cancellation(cancellation);

    let progress: Box<dyn ProgressNotifier> = if cli.quiet || !config.output.show_progress {
        Box::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(ProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    };

    let result = match &cli.replay {
        Some(run_id) => {
            let path = trace_path.ok_or_else(|| anyhow!("Replay needs [trace] enabled"))?;
            let previous = JsonlTraceRecorder::load_run(&path, run_id)?
                .ok_or_else(|| anyhow!("Run {} not found in {}", run_id, path.display()))?;
            use_case.replay(input, &previous, progress.as_ref()).await
        }
        None => use_case.execute_with_progress(input, progress.as_ref()).await,
    };

    let run = match result {
        Ok(run) => run,
        Err(e) => {
            if let Some(partial) = e.partial_run() {
                eprintln!("{}", ConsoleFormatter::format(partial));
            }
            return Err(e.into());
        }
    };

    let output = match cli.format {
        OutputFormat::Full => ConsoleFormatter::format(&run),
        OutputFormat::Note => ConsoleFormatter::format_note_only(&run),
        OutputFormat::Json => ConsoleFormatter::format_json(&run),
    };
    println!("{}", output);

    if run.is_failed() {
        bail!(
            "Run {} failed: {}",
            run.run_id,
            run.termination_reason.describe()
        );
    }
    Ok(())
}
