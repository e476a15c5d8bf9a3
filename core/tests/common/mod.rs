#![allow(dead_code)]

use std::future::Future;
use std::io::Cursor;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use pchain_core::{ExecError, Pipeline, Stage, StageEndpoints};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

/// Stage-side halves of an in-process stage's streams.
pub struct StageIo {
    pub stdin: DuplexStream,
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
}

type Behavior = Box<dyn FnOnce(StageIo) -> BoxFuture<'static, Result<(), String>> + Send>;

/// An in-process stage backed by small in-memory pipes, so it blocks on full buffers the
/// way a process blocks on a full OS pipe.
pub struct FnStage {
    name: String,
    capacity: usize,
    behavior: Option<Behavior>,
    io: Option<StageIo>,
    claimed: bool,
    start_error: Option<String>,
    task: Option<JoinHandle<Result<(), String>>>,
}

impl FnStage {
    pub fn new<F, Fut>(name: &str, f: F) -> Self
    where
        F: FnOnce(StageIo) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            capacity: 1024,
            behavior: Some(Box::new(move |io| f(io).boxed())),
            io: None,
            claimed: false,
            start_error: None,
            task: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// A stage whose `start` fails.
    pub fn unstartable(name: &str, message: &str) -> Self {
        let mut stage = Self::new(name, |_io| async { Ok(()) });
        stage.start_error = Some(message.to_string());
        stage
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoints(&mut self) -> anyhow::Result<StageEndpoints> {
        if self.task.is_some() {
            anyhow::bail!("stage already running");
        }
        if self.claimed {
            anyhow::bail!("endpoints already claimed");
        }
        self.claimed = true;

        let (stdin_outer, stdin_inner) = tokio::io::duplex(self.capacity);
        let (stdout_outer, stdout_inner) = tokio::io::duplex(self.capacity);
        let (stderr_outer, stderr_inner) = tokio::io::duplex(self.capacity);
        self.io = Some(StageIo {
            stdin: stdin_inner,
            stdout: stdout_inner,
            stderr: stderr_inner,
        });

        Ok(StageEndpoints::ready(
            Box::new(stdin_outer),
            Box::new(stdout_outer),
            Box::new(stderr_outer),
        ))
    }

    async fn start(&mut self) -> anyhow::Result<()> {
        let io = self
            .io
            .take()
            .ok_or_else(|| anyhow::anyhow!("endpoints were never claimed"))?;
        if let Some(message) = self.start_error.take() {
            drop(io);
            anyhow::bail!(message);
        }
        let behavior = self
            .behavior
            .take()
            .ok_or_else(|| anyhow::anyhow!("stage already started"))?;
        self.task = Some(tokio::spawn(behavior(io)));
        Ok(())
    }

    async fn wait(&mut self) -> anyhow::Result<()> {
        let task = self
            .task
            .take()
            .ok_or_else(|| anyhow::anyhow!("stage was never started"))?;
        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(anyhow::anyhow!(message)),
            Err(e) if e.is_cancelled() => Err(anyhow::anyhow!("killed")),
            Err(e) => Err(anyhow::anyhow!("stage panicked: {e}")),
        }
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        if let Some(task) = &self.task {
            task.abort();
        }
        Ok(())
    }
}

fn io_err(e: std::io::Error) -> String {
    e.to_string()
}

/// Copies input to output unchanged, like `cat`.
pub fn identity(name: &str) -> FnStage {
    FnStage::new(name, |mut io| async move {
        tokio::io::copy(&mut io.stdin, &mut io.stdout)
            .await
            .map_err(io_err)?;
        Ok(())
    })
}

/// Emits the byte count of its input as decimal text, like `wc --chars`.
pub fn count_bytes(name: &str) -> FnStage {
    FnStage::new(name, |mut io| async move {
        let mut input = Vec::new();
        io.stdin.read_to_end(&mut input).await.map_err(io_err)?;
        io.stdout
            .write_all(input.len().to_string().as_bytes())
            .await
            .map_err(io_err)?;
        Ok(())
    })
}

/// Copies input to both output and diagnostics, like `tee /dev/stderr`.
pub fn tee_stderr(name: &str) -> FnStage {
    FnStage::new(name, |mut io| async move {
        let mut buf = [0u8; 256];
        loop {
            let n = io.stdin.read(&mut buf).await.map_err(io_err)?;
            if n == 0 {
                return Ok(());
            }
            io.stdout.write_all(&buf[..n]).await.map_err(io_err)?;
            io.stderr.write_all(&buf[..n]).await.map_err(io_err)?;
        }
    })
}

/// Writes `diagnostic` and exits with a failure, without reading its input.
pub fn failing(name: &str, diagnostic: &'static str) -> FnStage {
    FnStage::new(name, move |mut io| async move {
        io.stderr
            .write_all(diagnostic.as_bytes())
            .await
            .map_err(io_err)?;
        Err("exit status: 1".to_string())
    })
}

/// Succeeds after draining its input and writing `diagnostic`.
pub fn chatty(name: &str, diagnostic: &'static str) -> FnStage {
    FnStage::new(name, move |mut io| async move {
        let mut sink = Vec::new();
        io.stdin.read_to_end(&mut sink).await.map_err(io_err)?;
        io.stderr
            .write_all(diagnostic.as_bytes())
            .await
            .map_err(io_err)?;
        Ok(())
    })
}

/// Writes `n` diagnostic bytes before touching its input, then behaves like `identity`.
pub fn flood_stderr(name: &str, n: usize) -> FnStage {
    FnStage::new(name, move |mut io| async move {
        let chunk = vec![b'e'; 4096];
        let mut left = n;
        while left > 0 {
            let take = left.min(chunk.len());
            io.stderr.write_all(&chunk[..take]).await.map_err(io_err)?;
            left -= take;
        }
        tokio::io::copy(&mut io.stdin, &mut io.stdout)
            .await
            .map_err(io_err)?;
        Ok(())
    })
}

/// Never finishes on its own and keeps every stream open.
pub fn hang(name: &str) -> FnStage {
    FnStage::new(name, |io| async move {
        let _io = io;
        futures::future::pending::<()>().await;
        Ok(())
    })
}

/// Leaves its output and diagnostic streams with a detached task, the way a process can
/// leave its pipes to a child of its own, then waits to be killed.
pub fn orphaning(name: &str) -> FnStage {
    FnStage::new(name, |io| async move {
        let StageIo { stdout, stderr, .. } = io;
        tokio::spawn(async move {
            let _held = (stdout, stderr);
            futures::future::pending::<()>().await;
        });
        futures::future::pending::<()>().await;
        Ok(())
    })
}

/// Routes core tracing to the test harness output, filtered by `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct RunResult {
    pub output: Vec<u8>,
    pub report: Vec<u8>,
    pub result: Result<(), ExecError>,
}

impl RunResult {
    pub fn output_str(&self) -> &str {
        std::str::from_utf8(&self.output).expect("utf-8 output")
    }

    pub fn report_str(&self) -> &str {
        std::str::from_utf8(&self.report).expect("utf-8 report")
    }
}

pub async fn run(stages: Vec<FnStage>, input: &[u8], verbose: bool) -> RunResult {
    init_logging();
    let mut pl = Pipeline::new(Cursor::new(input.to_vec()), Vec::new(), Vec::new());
    pl.set_verbose(verbose);
    for stage in stages {
        pl.chain(stage);
    }

    let result = pl.exec().await;
    let (output, report) = pl.into_sinks();
    RunResult {
        output: output.expect("output sink returned"),
        report,
        result,
    }
}
