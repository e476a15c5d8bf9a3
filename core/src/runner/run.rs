use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{ExecError, LinkError, StageError};

use super::abort;
use super::io_pump::{self, CopyResults};
use super::lifecycle;
use super::link;
use super::report;
use super::traits::Stage;
use super::types::{FailureHorizon, PipelineState};

/// A linear chain of stages between one input, one output and one diagnostic report.
///
/// ```no_run
/// # async fn demo(stages: Vec<Box<dyn pchain_core::Stage>>) {
/// use pchain_core::Pipeline;
///
/// let mut pl = Pipeline::new(tokio::io::stdin(), tokio::io::stdout(), tokio::io::stderr());
/// pl.chain_all(stages);
/// if let Err(e) = pl.exec().await {
///     eprintln!("{e}");
/// }
/// # }
/// ```
pub struct Pipeline<I, O, E> {
    input: Option<I>,
    output: Option<O>,
    report: E,
    stages: Vec<Box<dyn Stage>>,
    verbose: bool,
    copy_buffer_bytes: usize,
    timeout: Option<Duration>,
    kill_grace: Duration,
    state: PipelineState,
}

impl<I, O, E> Pipeline<I, O, E>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send,
{
    pub fn new(input: I, output: O, report: E) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            input: Some(input),
            output: Some(output),
            report,
            stages: Vec::new(),
            verbose: defaults.verbose,
            copy_buffer_bytes: defaults.copy_buffer_bytes,
            timeout: defaults.timeout(),
            kill_grace: abort::KILL_GRACE,
            state: PipelineState::Unlinked,
        }
    }

    pub fn with_config(mut self, cfg: &PipelineConfig) -> Self {
        self.verbose = cfg.verbose;
        self.copy_buffer_bytes = cfg.copy_buffer_bytes;
        self.timeout = cfg.timeout();
        self
    }

    /// Appends a stage after the current last one.
    pub fn chain<S>(&mut self, stage: S) -> &mut Self
    where
        S: Stage + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn chain_all<T>(&mut self, stages: T) -> &mut Self
    where
        T: IntoIterator<Item = Box<dyn Stage>>,
    {
        self.stages.extend(stages);
        self
    }

    /// If true every stage's diagnostics are reported, otherwise only those up to and
    /// including the first failed stage.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// How long relays may run on after a deadline kill before they are cancelled.
    pub fn set_kill_grace(&mut self, grace: Duration) -> &mut Self {
        self.kill_grace = grace;
        self
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The external output. `None` while running, or if its relay panicked or was cancelled.
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    pub fn report(&self) -> &E {
        &self.report
    }

    pub fn into_sinks(self) -> (Option<O>, E) {
        (self.output, self.report)
    }

    /// Runs the whole chain: stdout of stage n feeds stage n + 1.
    ///
    /// Returns once every stage has exited and the diagnostic report has been written.
    /// Stages are consumed; a second call fails with a [`LinkError`].
    pub async fn exec(&mut self) -> Result<(), ExecError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("pipeline", %run_id, stages = self.stages.len());
        self.exec_inner().instrument(span).await
    }

    async fn exec_inner(&mut self) -> Result<(), ExecError> {
        self.state = PipelineState::Unlinked;

        let (input, output, linkage) = match self.link() {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(error = %e, "pipeline link failed");
                self.advance(PipelineState::Done);
                return Err(e.into());
            }
        };
        self.advance(PipelineState::Linked);

        let (launches, mut errors) = lifecycle::start_all(&mut self.stages).await;
        self.advance(PipelineState::Running);

        let copies = io_pump::spawn_relays(linkage, input, output, self.copy_buffer_bytes);
        self.advance(PipelineState::Draining);

        let CopyResults {
            errors: copy_errors,
            output,
            diagnostics,
        } = self.drain(copies).await;
        self.output = output;
        // drain() appends the timeout after the copy errors.
        errors.extend(copy_errors);

        let (outcomes, exit_errors) = lifecycle::wait_all(&mut self.stages, &launches).await;
        errors.extend(exit_errors);

        let horizon = FailureHorizon::from_outcomes(&outcomes);
        tracing::info!(
            stages = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.is_failed()).count(),
            %horizon,
            verbose = self.verbose,
            "pipeline stages exited"
        );

        let report_errors =
            report::aggregate(diagnostics, &outcomes, self.verbose, &mut self.report).await;
        errors.extend(report_errors);
        self.advance(PipelineState::Aggregated);

        self.advance(PipelineState::Done);
        ExecError::from_errors(errors)
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::debug!(from = ?self.state, state = ?next, "pipeline state");
        self.state = next;
    }

    fn link(&mut self) -> Result<(I, O, link::Linkage), LinkError> {
        if self.stages.is_empty() {
            return Err(LinkError::Empty);
        }
        if self.input.is_none() {
            return Err(LinkError::ExternalConsumed("input"));
        }
        if self.output.is_none() {
            return Err(LinkError::ExternalConsumed("output"));
        }

        let linkage = link::link(&mut self.stages)?;

        match (self.input.take(), self.output.take()) {
            (Some(input), Some(output)) => Ok((input, output, linkage)),
            _ => Err(LinkError::ExternalConsumed("input")),
        }
    }

    /// Waits for every relay, killing all stages first if the deadline passes. Relays still
    /// open after the kill grace period are cancelled.
    async fn drain(&mut self, copies: io_pump::CopySet<O>) -> CopyResults<O> {
        let relays = copies.abort_handles();
        let join = copies.join();
        tokio::pin!(join);

        let Some(limit) = self.timeout else {
            return join.await;
        };

        match tokio::time::timeout(limit, &mut join).await {
            Ok(results) => results,
            Err(_) => {
                abort::abort_sequence(&mut self.stages, limit).await;
                let mut results = match tokio::time::timeout(self.kill_grace, &mut join).await {
                    Ok(results) => results,
                    Err(_) => {
                        abort::abandon_relays(&relays, self.kill_grace);
                        join.await
                    }
                };
                results.errors.push(StageError::Timeout(limit));
                results
            }
        }
    }
}
