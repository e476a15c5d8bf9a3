use std::collections::HashMap;
use std::path::PathBuf;

/// How to launch one process stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Program and arguments joined by spaces, for logs and error messages.
    pub fn display_name(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Splits a flat argument list into commands at every `separator` token.
    ///
    /// `["cat", "::", "wc", "-c"]` with `"::"` gives `cat` and `wc -c`.
    pub fn parse_chain<S: AsRef<str>>(argv: &[S], separator: &str) -> anyhow::Result<Vec<Self>> {
        if argv.is_empty() {
            anyhow::bail!("no commands given");
        }

        let mut specs = Vec::new();
        for (position, segment) in argv.split(|a| a.as_ref() == separator).enumerate() {
            let Some((program, args)) = segment.split_first() else {
                anyhow::bail!("empty command at position {position}");
            };
            specs.push(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref().to_string())));
        }

        Ok(specs)
    }
}
