use std::path::PathBuf;

use clap::Parser;
use pchain_cli::app;
use pchain_cli::commands::cli;
use pchain_core::config::LoggingConfig;
use pchain_core::error::{self, StageError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    std::process::exit(real_main().await);
}

async fn real_main() -> i32 {
    let args = cli::Args::parse();
    let cfg = match pchain_core::config::load_default(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => return fail(&error::CliError::Config(format!("{e:#}"))),
    };
    // Held until return so the file writer flushes before exit.
    let _log_guard = match init_tracing(&cfg.logging) {
        Ok(guard) => guard,
        Err(e) => return fail(&error::CliError::Config(e)),
    };

    match app::run_app(args, &cfg).await {
        Ok(code) => code,
        Err(e) => fail(&e),
    }
}

/// Stderr carries the stage report, so a failed run only adds what the report cannot show:
/// stages that never started. The full error list goes to the log.
fn fail(e: &error::CliError) -> i32 {
    match e {
        error::CliError::Exec(ee) if !ee.is_link() => {
            tracing::error!(error = %ee, "pipeline failed");
            for start in ee
                .errors()
                .iter()
                .filter(|err| matches!(err, StageError::Start { .. }))
            {
                eprintln!("pchain: {start}");
            }
        }
        _ => eprintln!("pchain: {e}"),
    }
    exit_code_for_error(e)
}

fn exit_code_for_error(e: &error::CliError) -> i32 {
    // 0: success
    // 1: a stage failed, or a stream could not be relayed
    // 2: usage or pipeline setup error
    // 11: config error
    // 20: io error
    // 50: internal/uncategorized
    match e {
        error::CliError::Exec(ee) if ee.is_link() => 2,
        error::CliError::Exec(_) => 1,
        error::CliError::Usage(_) => 2,
        error::CliError::Config(_) => 11,
        error::CliError::Io(_) => 20,
        error::CliError::Anyhow(_) => 50,
    }
}

/// Installs the subscriber. Nothing is installed unless console or file logging is on; the
/// console layer shares stderr with the report and is opt-in.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>, String> {
    if !logging.enabled || (!logging.console && !logging.file) {
        return Ok(None);
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(&logging.level).map_err(|e| e.to_string())?,
    };

    let (file_layer, guard) = if logging.file {
        let dir = logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("pchain"));
        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;

        let appender =
            tracing_appender::rolling::never(dir, format!("pchain.{}.log", std::process::id()));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
