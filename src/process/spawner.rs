//! Process spawning
//!
//! The spawning capability is injected into every process handle so tests can
//! substitute fake children for the camera and ffmpeg programs.

use super::types::{CommandLine, ProcessExit};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

/// Everything needed to launch one external process
#[derive(Debug)]
pub struct Invocation {
    pub command: CommandLine,
    /// Standard input, `None` for the null device
    pub stdin: Option<Stdio>,
    /// Standard output, `None` for the null device
    pub stdout: Option<Stdio>,
}

/// A spawned external process
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if still known
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> std::io::Result<ProcessExit>;

    /// Ask the process to die without waiting for it
    fn start_kill(&mut self) -> std::io::Result<()>;
}

/// Capability to launch external processes
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, invocation: Invocation) -> std::io::Result<Box<dyn ChildProcess>>;
}

/// Spawns real OS processes through tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(&self, invocation: Invocation) -> std::io::Result<Box<dyn ChildProcess>> {
        let Invocation {
            command,
            stdin,
            stdout,
        } = invocation;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(stdin.unwrap_or_else(Stdio::null))
            .stdout(stdout.unwrap_or_else(Stdio::null))
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group: a terminal Ctrl-C reaches only us, and the
        // children are stopped through teardown instead
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;

        tracing::debug!(program = %command.program, pid = ?child.id(), "Spawned process");

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(command.program.clone(), stderr));
        }

        Ok(Box::new(SystemChild { child }))
    }
}

struct SystemChild {
    child: Child,
}

#[async_trait]
impl ChildProcess for SystemChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> std::io::Result<ProcessExit> {
        self.child.wait().await.map(ProcessExit::from)
    }

    fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

/// Re-emit a child's stderr as debug events until it closes
async fn forward_stderr(program: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(program = %program, "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(program = %program, "Stopped reading stderr: {}", e);
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_system_spawner_reports_exit_code() {
        let invocation = Invocation {
            command: CommandLine::new("sh", vec!["-c".into(), "exit 3".into()]),
            stdin: None,
            stdout: None,
        };

        let mut child = SystemSpawner.spawn(invocation).unwrap();
        let exit = child.wait().await.unwrap();
        assert_eq!(exit, ProcessExit::from_code(3));
    }

    #[tokio::test]
    async fn test_system_spawner_missing_executable() {
        let invocation = Invocation {
            command: CommandLine::new("camcast-definitely-not-installed", vec![]),
            stdin: None,
            stdout: None,
        };

        let err = SystemSpawner.spawn(invocation).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_group_interrupt_stays_with_child() {
        let mut interrupts =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).unwrap();

        // `kill -INT 0` signals the whole process group, like a terminal does
        let invocation = Invocation {
            command: CommandLine::new("sh", vec!["-c".into(), "kill -INT 0".into()]),
            stdin: None,
            stdout: None,
        };
        let mut child = SystemSpawner.spawn(invocation).unwrap();
        let exit = child.wait().await.unwrap();
        assert!(!exit.success());

        let received =
            tokio::time::timeout(std::time::Duration::from_millis(200), interrupts.recv()).await;
        assert!(received.is_err(), "interrupt leaked to the parent group");
    }
}
