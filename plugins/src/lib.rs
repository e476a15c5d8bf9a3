pub mod runner;

pub use runner::{CommandSpec, ProcessStage};
