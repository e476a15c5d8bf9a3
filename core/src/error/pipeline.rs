use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Identifies the stream a relay task was serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLabel {
    /// External input into stage 0.
    Input,
    /// Primary output of stage `n` into primary input of stage `n + 1`.
    Link(usize),
    /// Primary output of the last stage into the external output.
    Output,
    /// Diagnostic stream of stage `n`.
    Diagnostic(usize),
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamLabel::Input => write!(f, "external input -> stage 0"),
            StreamLabel::Link(i) => write!(f, "stage {} -> stage {}", i, i + 1),
            StreamLabel::Output => write!(f, "last stage -> external output"),
            StreamLabel::Diagnostic(i) => write!(f, "stage {i} stderr"),
        }
    }
}

/// Pre-flight wiring failure. Nothing has been spawned when this is returned.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("pipeline has no stages")]
    Empty,
    #[error("external {0} already consumed by an earlier run")]
    ExternalConsumed(&'static str),
    #[error("stage {index} ({name}): cannot claim endpoints: {message}")]
    Endpoints {
        index: usize,
        name: String,
        message: String,
    },
}

/// A non-fatal failure recorded while a linked pipeline runs.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("stage {index} ({name}) failed to start: {message}")]
    Start {
        index: usize,
        name: String,
        message: String,
    },
    #[error("stream copy failed ({stream}): {source}")]
    StreamCopy {
        stream: StreamLabel,
        #[source]
        source: std::io::Error,
    },
    #[error("stream copy task aborted ({stream}): {message}")]
    TaskJoin { stream: StreamLabel, message: String },
    #[error("pipeline timed out after {0:?}, stages were killed")]
    Timeout(Duration),
    #[error("stage {index} ({name}) failed: {message}")]
    Exit {
        index: usize,
        name: String,
        message: String,
    },
    #[error("report write failed for stage {index}: {source}")]
    ReportWrite {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Result of [`crate::runner::Pipeline::exec`] when anything went wrong.
///
/// `Link` is always returned alone. `Failed` carries every other recorded error in
/// deterministic order, and displays as one message per line.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("{}", join_lines(.0))]
    Failed(Vec<StageError>),
}

impl ExecError {
    pub fn errors(&self) -> &[StageError] {
        match self {
            Self::Link(_) => &[],
            Self::Failed(errs) => errs,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Self::Link(_))
    }

    /// Turns an accumulated error list into a result: empty means success.
    pub fn from_errors(errs: Vec<StageError>) -> Result<(), ExecError> {
        if errs.is_empty() {
            Ok(())
        } else {
            Err(ExecError::Failed(errs))
        }
    }
}

fn join_lines(errs: &[StageError]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
