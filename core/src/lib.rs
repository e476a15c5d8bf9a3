//! Chains processes so each stage's stdout feeds the next stage's stdin, and assembles
//! every stage's stderr into one report that stops at the first failure.

pub mod config;
pub mod error;
pub mod runner;

pub use error::{ExecError, LinkError, StageError};
pub use runner::{Pipeline, Stage, StageEndpoints};
