use std::path::PathBuf;

use clap::Parser;

/// Run commands as a pipe chain: stdout of each feeds stdin of the next.
///
/// Stderr of every stage is collected and printed once all stages have exited, stopping at
/// the first failed stage unless `--verbose` is given.
#[derive(Parser, Debug)]
#[command(name = "pchain", version)]
pub struct Args {
    /// Report stderr of every stage, not only up to the first failure.
    #[arg(short, long)]
    pub verbose: bool,

    /// Kill all stages if their streams are still open after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Relay chunk size in bytes.
    #[arg(long)]
    pub buffer_bytes: Option<usize>,

    /// Config file (defaults: $PCHAIN_CONFIG, ~/.pchain/config.toml, ./pchain.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Do not forward stdin to the first stage. Implied when stdin is a terminal.
    #[arg(long)]
    pub no_stdin: bool,

    /// Token separating one command from the next.
    #[arg(long, default_value = "::")]
    pub separator: String,

    /// Commands and their arguments, e.g. `cat :: wc -c`.
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true,
        value_name = "COMMAND"
    )]
    pub commands: Vec<String>,
}
