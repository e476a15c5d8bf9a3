#[allow(clippy::module_inception)]
pub mod error;
pub mod pipeline;

pub use error::CliError;
pub use pipeline::{ExecError, LinkError, StageError, StreamLabel};
