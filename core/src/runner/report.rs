use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::StageError;

use super::types::{DiagnosticBuffer, ExitOutcome, FailureHorizon};

/// Flushes the selected diagnostic buffers into the report sink, in stage order.
///
/// Runs once all outcomes and buffers are final. A failed write is recorded and the
/// remaining buffers are still attempted.
pub(crate) async fn aggregate<E>(
    mut buffers: Vec<DiagnosticBuffer>,
    outcomes: &[ExitOutcome],
    verbose: bool,
    report: &mut E,
) -> Vec<StageError>
where
    E: AsyncWrite + Unpin + Send,
{
    let horizon = FailureHorizon::from_outcomes(outcomes);
    let mut errors = Vec::new();

    buffers.sort_by_key(|b| b.index);

    for buf in buffers {
        if !horizon.reports(buf.index, verbose) {
            tracing::debug!(index = buf.index, bytes = buf.bytes.len(), "diagnostics suppressed");
            continue;
        }
        if buf.bytes.is_empty() {
            continue;
        }

        let res = async {
            report.write_all(&buf.bytes).await?;
            report.flush().await
        }
        .await;

        if let Err(source) = res {
            tracing::warn!(index = buf.index, error = %source, "report write failed");
            errors.push(StageError::ReportWrite {
                index: buf.index,
                source,
            });
        }
    }

    errors
}
