mod command;
mod process;

pub use command::CommandSpec;
pub use process::ProcessStage;
