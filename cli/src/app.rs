use pchain_core::config::{AppConfig, PipelineConfig};
use pchain_core::error::CliError;
use pchain_core::runner::BoxReader;
use pchain_core::{Pipeline, Stage};
use pchain_plugins::{CommandSpec, ProcessStage};

use crate::commands::cli::Args;

/// Config file values, overridden by whatever was given on the command line.
pub fn pipeline_config(args: &Args, cfg: &AppConfig) -> PipelineConfig {
    let mut out = cfg.pipeline.clone();
    if args.verbose {
        out.verbose = true;
    }
    if let Some(ms) = args.timeout_ms {
        out.timeout_ms = Some(ms);
    }
    if let Some(n) = args.buffer_bytes {
        out.copy_buffer_bytes = n;
    }
    out
}

pub fn build_stages(args: &Args) -> Result<Vec<Box<dyn Stage>>, CliError> {
    let specs = CommandSpec::parse_chain(&args.commands[..], &args.separator)
        .map_err(|e| CliError::Usage(e.to_string()))?;

    Ok(specs
        .into_iter()
        .map(|spec| Box::new(ProcessStage::new(spec)) as Box<dyn Stage>)
        .collect())
}

pub async fn run_app(args: Args, cfg: &AppConfig) -> Result<i32, CliError> {
    let pipeline_cfg = pipeline_config(&args, cfg);
    let stages = build_stages(&args)?;

    let input: BoxReader = if args.no_stdin || atty::is(atty::Stream::Stdin) {
        Box::new(tokio::io::empty())
    } else {
        Box::new(tokio::io::stdin())
    };

    tracing::debug!(
        stages = stages.len(),
        verbose = pipeline_cfg.verbose,
        timeout_ms = ?pipeline_cfg.timeout_ms,
        "starting pipeline"
    );

    let mut pl = Pipeline::new(input, tokio::io::stdout(), tokio::io::stderr())
        .with_config(&pipeline_cfg);
    pl.chain_all(stages);
    pl.exec().await?;

    Ok(0)
}
