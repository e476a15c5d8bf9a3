use std::process::Stdio;

use anyhow::Result;
use async_trait::async_trait;
use pchain_core::runner::{deferred_reader, deferred_writer, ReaderSlot, WriterSlot};
use pchain_core::{Stage, StageEndpoints};
use tokio::process::{Child, Command};

use super::command::CommandSpec;

/// A pipeline stage backed by a child process.
pub struct ProcessStage {
    spec: CommandSpec,
    name: String,
    claimed: bool,
    slots: Option<Slots>,
    child: Option<Child>,
}

struct Slots {
    stdin: WriterSlot,
    stdout: ReaderSlot,
    stderr: ReaderSlot,
}

impl ProcessStage {
    pub fn new(spec: CommandSpec) -> Self {
        let name = spec.display_name();
        Self {
            spec,
            name,
            claimed: false,
            slots: None,
            child: None,
        }
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// OS process id, once started and until reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

impl From<CommandSpec> for ProcessStage {
    fn from(spec: CommandSpec) -> Self {
        Self::new(spec)
    }
}

#[async_trait]
impl Stage for ProcessStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoints(&mut self) -> Result<StageEndpoints> {
        if self.child.is_some() {
            anyhow::bail!("process already running");
        }
        if self.claimed {
            anyhow::bail!("endpoints already claimed");
        }
        self.claimed = true;

        let (stdin_slot, stdin) = deferred_writer();
        let (stdout_slot, stdout) = deferred_reader();
        let (stderr_slot, stderr) = deferred_reader();
        self.slots = Some(Slots {
            stdin: stdin_slot,
            stdout: stdout_slot,
            stderr: stderr_slot,
        });

        Ok(StageEndpoints {
            stdin,
            stdout,
            stderr,
        })
    }

    async fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            anyhow::bail!("process already started");
        }
        // Taken before spawning so a failed spawn releases every endpoint.
        let slots = self
            .slots
            .take()
            .ok_or_else(|| anyhow::anyhow!("endpoints were never claimed"))?;

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .envs(&self.spec.envs)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a kill also reaches whatever the stage spawned itself.
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("spawn {} failed: {e}", self.spec.program))?;
        tracing::debug!(stage = %self.name, pid = ?child.id(), "process spawned");

        if let Some(stdin) = child.stdin.take() {
            slots.stdin.fill(stdin);
        }
        if let Some(stdout) = child.stdout.take() {
            slots.stdout.fill(stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            slots.stderr.fill(stderr);
        }

        self.child = Some(child);
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("process was never started"))?;
        let status = child.wait().await?;
        tracing::debug!(stage = %self.name, %status, "process exited");

        if status.success() {
            Ok(())
        } else {
            anyhow::bail!("{status}")
        }
    }

    async fn kill(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if let Some(pid) = child.id() {
            kill_group(pid)?;
        }
        child.start_kill()?;
        Ok(())
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pgid)?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // group already gone
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("kill process group {pgid}: {e}")),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_can_only_be_claimed_once() {
        let mut stage = ProcessStage::new(CommandSpec::new("cat"));
        assert!(stage.endpoints().is_ok());

        let err = stage.endpoints().err().expect("second claim must fail");
        assert_eq!(err.to_string(), "endpoints already claimed");
    }

    #[tokio::test]
    async fn start_without_endpoints_fails() {
        let mut stage = ProcessStage::new(CommandSpec::new("cat"));
        let err = stage.start().await.unwrap_err();
        assert_eq!(err.to_string(), "endpoints were never claimed");
        assert!(stage.id().is_none());
    }

    #[tokio::test]
    async fn wait_before_start_fails() {
        let mut stage = ProcessStage::new(CommandSpec::new("cat").arg("-u"));
        assert_eq!(stage.name(), "cat -u");
        assert!(stage.wait().await.is_err());
    }
}
