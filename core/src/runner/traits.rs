use std::io;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;
pub type BoxWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// A stage output that becomes readable once the stage has started.
pub type PendingReader = BoxFuture<'static, io::Result<BoxReader>>;
/// A stage input that becomes writable once the stage has started.
pub type PendingWriter = BoxFuture<'static, io::Result<BoxWriter>>;

/// The three stream endpoints of one stage, claimed by the linker before anything runs.
pub struct StageEndpoints {
    pub stdin: PendingWriter,
    pub stdout: PendingReader,
    pub stderr: PendingReader,
}

impl StageEndpoints {
    /// Endpoints that are usable immediately, e.g. for in-process stages.
    pub fn ready(stdin: BoxWriter, stdout: BoxReader, stderr: BoxReader) -> Self {
        Self {
            stdin: futures::future::ready(Ok(stdin)).boxed(),
            stdout: futures::future::ready(Ok(stdout)).boxed(),
            stderr: futures::future::ready(Ok(stderr)).boxed(),
        }
    }
}

/// One spawnable unit in a pipeline.
///
/// The pipeline calls `endpoints` exactly once, then `start`, and only calls `wait` after
/// every stream handed out by `endpoints` has been drained. An implementation whose `start`
/// fails must release its pending endpoints, otherwise the relays serving them never finish.
#[async_trait]
pub trait Stage: Send {
    fn name(&self) -> &str;

    /// Hands out the stage's stream endpoints. Fails if they were already claimed or the
    /// stage is already running.
    fn endpoints(&mut self) -> anyhow::Result<StageEndpoints>;

    async fn start(&mut self) -> anyhow::Result<()>;

    /// Blocks until the stage exits. `Err` is a failed exit outcome.
    async fn wait(&mut self) -> anyhow::Result<()>;

    /// Forcibly terminates a running stage.
    async fn kill(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
