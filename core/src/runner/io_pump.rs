use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::{StageError, StreamLabel};

use super::link::Linkage;
use super::traits::{PendingReader, PendingWriter};
use super::types::DiagnosticBuffer;

/// Every relay task of one run, kept in the order their errors are reported.
pub(crate) struct CopySet<O> {
    input: JoinHandle<Result<u64, StageError>>,
    links: Vec<JoinHandle<Result<u64, StageError>>>,
    output: JoinHandle<(O, Result<u64, StageError>)>,
    diagnostics: Vec<JoinHandle<(DiagnosticBuffer, Result<u64, StageError>)>>,
}

/// What the copy phase left behind once every relay has finished.
pub(crate) struct CopyResults<O> {
    pub errors: Vec<StageError>,
    pub output: Option<O>,
    pub diagnostics: Vec<DiagnosticBuffer>,
}

/// Spawns one relay per stream of the linkage.
pub(crate) fn spawn_relays<I, O>(
    linkage: Linkage,
    input: I,
    output: O,
    buf_size: usize,
) -> CopySet<O>
where
    I: AsyncRead + Unpin + Send + 'static,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let Linkage {
        stdin,
        links,
        stdout,
        diagnostics,
    } = linkage;

    let input = tokio::spawn(feed_stage(StreamLabel::Input, input, stdin, buf_size));

    let links = links
        .into_iter()
        .enumerate()
        .map(|(i, (from, to))| tokio::spawn(link_stages(StreamLabel::Link(i), from, to, buf_size)))
        .collect();

    let output = tokio::spawn(async move {
        let mut output = output;
        let res = drain_stage(StreamLabel::Output, stdout, &mut output, buf_size).await;
        (output, res)
    });

    let diagnostics = diagnostics
        .into_iter()
        .enumerate()
        .map(|(index, stderr)| {
            tokio::spawn(async move {
                let mut buf = DiagnosticBuffer {
                    index,
                    bytes: Vec::new(),
                };
                let res =
                    drain_stage(StreamLabel::Diagnostic(index), stderr, &mut buf.bytes, buf_size)
                        .await;
                (buf, res)
            })
        })
        .collect();

    CopySet {
        input,
        links,
        output,
        diagnostics,
    }
}

impl<O> CopySet<O> {
    /// Handles that cancel every relay without giving up the join.
    pub(crate) fn abort_handles(&self) -> Vec<AbortHandle> {
        let mut handles = Vec::with_capacity(self.links.len() + self.diagnostics.len() + 2);
        handles.push(self.input.abort_handle());
        handles.extend(self.links.iter().map(JoinHandle::abort_handle));
        handles.push(self.output.abort_handle());
        handles.extend(self.diagnostics.iter().map(JoinHandle::abort_handle));
        handles
    }

    /// Waits for every relay. Diagnostic buffers come back in stage order, partial if their
    /// relay failed.
    pub(crate) async fn join(self) -> CopyResults<O> {
        let mut errors = Vec::new();

        match self.input.await {
            Ok(res) => record(&mut errors, StreamLabel::Input, res),
            Err(e) => errors.push(join_error(StreamLabel::Input, e)),
        }

        for (i, task) in self.links.into_iter().enumerate() {
            match task.await {
                Ok(res) => record(&mut errors, StreamLabel::Link(i), res),
                Err(e) => errors.push(join_error(StreamLabel::Link(i), e)),
            }
        }

        let output = match self.output.await {
            Ok((out, res)) => {
                record(&mut errors, StreamLabel::Output, res);
                Some(out)
            }
            Err(e) => {
                errors.push(join_error(StreamLabel::Output, e));
                None
            }
        };

        let mut diagnostics = Vec::with_capacity(self.diagnostics.len());
        for (index, task) in self.diagnostics.into_iter().enumerate() {
            match task.await {
                Ok((buf, res)) => {
                    record(&mut errors, StreamLabel::Diagnostic(index), res);
                    diagnostics.push(buf);
                }
                Err(e) => {
                    errors.push(join_error(StreamLabel::Diagnostic(index), e));
                    diagnostics.push(DiagnosticBuffer {
                        index,
                        bytes: Vec::new(),
                    });
                }
            }
        }

        CopyResults {
            errors,
            output,
            diagnostics,
        }
    }
}

fn record(errors: &mut Vec<StageError>, stream: StreamLabel, res: Result<u64, StageError>) {
    match res {
        Ok(total) => tracing::debug!(%stream, bytes = total, "relay finished"),
        Err(e) => {
            tracing::warn!(%stream, error = %e, "relay failed");
            errors.push(e);
        }
    }
}

fn join_error(stream: StreamLabel, e: tokio::task::JoinError) -> StageError {
    tracing::warn!(%stream, error = %e, "relay task aborted");
    StageError::TaskJoin {
        stream,
        message: e.to_string(),
    }
}

/// External input into a stage, closing the stage input at end-of-stream.
async fn feed_stage<R>(
    stream: StreamLabel,
    mut rd: R,
    to: PendingWriter,
    buf_size: usize,
) -> Result<u64, StageError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut wr = to.await.map_err(|source| StageError::StreamCopy { stream, source })?;
    let total = pump(&mut rd, &mut wr, stream, buf_size).await?;
    wr.shutdown()
        .await
        .map_err(|source| StageError::StreamCopy { stream, source })?;
    Ok(total)
}

/// Stage output into the next stage's input.
async fn link_stages(
    stream: StreamLabel,
    from: PendingReader,
    to: PendingWriter,
    buf_size: usize,
) -> Result<u64, StageError> {
    let (rd, wr) = futures::join!(from, to);
    // On any failure both ends drop here: the upstream stage sees a broken pipe and the
    // downstream one end-of-stream.
    let mut rd = rd.map_err(|source| StageError::StreamCopy { stream, source })?;
    let mut wr = wr.map_err(|source| StageError::StreamCopy { stream, source })?;
    let total = pump(&mut rd, &mut wr, stream, buf_size).await?;
    wr.shutdown()
        .await
        .map_err(|source| StageError::StreamCopy { stream, source })?;
    Ok(total)
}

/// Stage output into a sink the pipeline does not own the lifetime of; flushed, never closed.
async fn drain_stage<W>(
    stream: StreamLabel,
    from: PendingReader,
    wr: &mut W,
    buf_size: usize,
) -> Result<u64, StageError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut rd = from
        .await
        .map_err(|source| StageError::StreamCopy { stream, source })?;
    pump(&mut rd, wr, stream, buf_size).await
}

async fn pump<R, W>(
    rd: &mut R,
    wr: &mut W,
    stream: StreamLabel,
    buf_size: usize,
) -> Result<u64, StageError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buf_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = rd
            .read(&mut buf)
            .await
            .map_err(|source| StageError::StreamCopy { stream, source })?;
        if n == 0 {
            break;
        }

        wr.write_all(&buf[..n])
            .await
            .map_err(|source| StageError::StreamCopy { stream, source })?;
        total += n as u64;
    }

    wr.flush()
        .await
        .map_err(|source| StageError::StreamCopy { stream, source })?;

    Ok(total)
}
