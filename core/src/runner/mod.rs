mod abort;
pub mod endpoint;
mod io_pump;
mod lifecycle;
mod link;
mod report;
mod run;
mod traits;
pub mod types;

pub use endpoint::{deferred_reader, deferred_writer, ReaderSlot, WriterSlot};
pub use run::Pipeline;
pub use traits::{BoxReader, BoxWriter, PendingReader, PendingWriter, Stage, StageEndpoints};
pub use types::{DiagnosticBuffer, ExitOutcome, FailureHorizon, PipelineState};
