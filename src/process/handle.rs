//! Process handle
//!
//! An owned external-process invocation driven through an explicit state
//! machine: `Constructed -> Running -> {Exited | Failed}`.

use super::spawner::{ChildProcess, Invocation, ProcessSpawner};
use super::types::{CommandLine, ProcessError, ProcessExit, ProcessStatus};
use std::process::Stdio;
use std::sync::Arc;

/// Stream bindings held until the process is spawned
#[derive(Debug, Default)]
struct PendingIo {
    stdin: Option<Stdio>,
    stdout: Option<Stdio>,
}

enum ProcessState {
    Constructed(PendingIo),
    Running(Box<dyn ChildProcess>),
    Exited(ProcessExit),
    /// `spawned` is false when the process never got off the ground
    Failed { spawned: bool },
}

impl ProcessState {
    fn status(&self) -> ProcessStatus {
        match self {
            ProcessState::Constructed(_) => ProcessStatus::Constructed,
            ProcessState::Running(_) => ProcessStatus::Running,
            ProcessState::Exited(_) => ProcessStatus::Exited,
            ProcessState::Failed { .. } => ProcessStatus::Failed,
        }
    }
}

/// An external process owned by exactly one pipeline component
pub struct ProcessHandle {
    command: CommandLine,
    spawner: Arc<dyn ProcessSpawner>,
    state: ProcessState,
    terminate_requested: bool,
}

impl ProcessHandle {
    /// Create a handle for a process that has not been spawned yet
    pub fn new(spawner: Arc<dyn ProcessSpawner>, command: CommandLine) -> Self {
        Self {
            command,
            spawner,
            state: ProcessState::Constructed(PendingIo::default()),
            terminate_requested: false,
        }
    }

    /// The command line this handle runs
    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn program(&self) -> &str {
        &self.command.program
    }

    /// Current lifecycle state
    pub fn status(&self) -> ProcessStatus {
        self.state.status()
    }

    /// Exit status recorded by a successful `wait`
    pub fn exit(&self) -> Option<ProcessExit> {
        match &self.state {
            ProcessState::Exited(exit) => Some(*exit),
            _ => None,
        }
    }

    /// Bind standard input. Only valid before `start`.
    pub fn set_stdin(&mut self, stdin: Stdio) -> Result<(), ProcessError> {
        self.pending_io()?.stdin = Some(stdin);
        Ok(())
    }

    /// Bind standard output. Only valid before `start`.
    pub fn set_stdout(&mut self, stdout: Stdio) -> Result<(), ProcessError> {
        self.pending_io()?.stdout = Some(stdout);
        Ok(())
    }

    fn pending_io(&mut self) -> Result<&mut PendingIo, ProcessError> {
        match &mut self.state {
            ProcessState::Constructed(io) => Ok(io),
            _ => Err(ProcessError::AlreadyStarted {
                program: self.command.program.clone(),
            }),
        }
    }

    /// Spawn the process
    ///
    /// The stream bindings move into the child, so the parent keeps no copy
    /// of them once this returns.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        let io = match std::mem::replace(&mut self.state, ProcessState::Failed { spawned: false }) {
            ProcessState::Constructed(io) => io,
            other => {
                self.state = other;
                return Err(ProcessError::AlreadyStarted {
                    program: self.command.program.clone(),
                });
            }
        };

        let invocation = Invocation {
            command: self.command.clone(),
            stdin: io.stdin,
            stdout: io.stdout,
        };

        match self.spawner.spawn(invocation) {
            Ok(child) => {
                tracing::info!(program = %self.program(), pid = ?child.id(), "Started process");
                self.state = ProcessState::Running(child);
                Ok(())
            }
            Err(source) => Err(ProcessError::Spawn {
                program: self.command.program.clone(),
                source,
            }),
        }
    }

    /// Wait for the process to exit
    ///
    /// Cancel-safe: dropping the future leaves the process running and the
    /// handle waitable. A non-zero exit is an error unless `terminate` was
    /// requested first.
    pub async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        let program = self.program().to_string();
        let result = match &mut self.state {
            ProcessState::Running(child) => child.wait().await,
            ProcessState::Constructed(_) | ProcessState::Failed { spawned: false } => {
                return Err(ProcessError::NotStarted { program })
            }
            ProcessState::Exited(_) | ProcessState::Failed { spawned: true } => {
                return Err(ProcessError::AlreadyWaited { program })
            }
        };

        match result {
            Ok(exit) if exit.success() || self.terminate_requested => {
                tracing::info!(program = %program, %exit, "Process exited");
                self.state = ProcessState::Exited(exit);
                Ok(exit)
            }
            Ok(exit) => {
                self.state = ProcessState::Failed { spawned: true };
                Err(ProcessError::Exited { program, exit })
            }
            Err(source) => {
                self.state = ProcessState::Failed { spawned: true };
                Err(ProcessError::Wait { program, source })
            }
        }
    }

    /// Kill a running process; the following `wait` reports success
    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        match &mut self.state {
            ProcessState::Running(child) => {
                self.terminate_requested = true;
                tracing::info!(program = %self.command.program, "Terminating process");
                child.start_kill().map_err(|source| ProcessError::Wait {
                    program: self.command.program.clone(),
                    source,
                })
            }
            ProcessState::Constructed(_) | ProcessState::Failed { spawned: false } => {
                Err(ProcessError::NotStarted {
                    program: self.command.program.clone(),
                })
            }
            ProcessState::Exited(_) | ProcessState::Failed { spawned: true } => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command", &self.command)
            .field("status", &self.status())
            .field("exit", &self.exit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{FakeBehavior, FakeSpawner};

    fn handle(spawner: &Arc<FakeSpawner>) -> ProcessHandle {
        ProcessHandle::new(spawner.clone(), CommandLine::new("fake", vec![]))
    }

    #[tokio::test]
    async fn test_wait_before_start_is_not_started() {
        let spawner = Arc::new(FakeSpawner::new());
        let mut process = handle(&spawner);

        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::NotStarted { .. }));
        assert_eq!(process.status(), ProcessStatus::Constructed);
        assert!(spawner.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_wait_twice_is_already_waited() {
        let spawner = Arc::new(FakeSpawner::new());
        let mut process = handle(&spawner);

        process.start().unwrap();
        assert_eq!(process.status(), ProcessStatus::Running);

        assert_eq!(process.exit(), None);
        let exit = process.wait().await.unwrap();
        assert!(exit.success());
        assert_eq!(process.status(), ProcessStatus::Exited);
        assert_eq!(process.exit(), Some(exit));

        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyWaited { .. }));
    }

    #[tokio::test]
    async fn test_start_twice_is_already_started() {
        let spawner = Arc::new(FakeSpawner::new());
        let mut process = handle(&spawner);

        process.start().unwrap();
        let err = process.start().unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyStarted { .. }));
        assert_eq!(spawner.spawned().len(), 1);
        assert!(process.set_stdin(Stdio::null()).is_err());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let spawner = Arc::new(FakeSpawner::with_behavior(FakeBehavior::FailToSpawn));
        let mut process = handle(&spawner);

        let err = process.start().unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert_eq!(process.status(), ProcessStatus::Failed);

        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::NotStarted { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let spawner = Arc::new(FakeSpawner::with_behavior(FakeBehavior::Exit(1)));
        let mut process = handle(&spawner);

        process.start().unwrap();
        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::Exited { exit, .. } if exit.code == Some(1)));
        assert_eq!(process.status(), ProcessStatus::Failed);

        let err = process.wait().await.unwrap_err();
        assert!(matches!(err, ProcessError::AlreadyWaited { .. }));
    }

    #[tokio::test]
    async fn test_terminate_then_wait_succeeds() {
        let spawner = Arc::new(FakeSpawner::with_behavior(FakeBehavior::RunUntilKilled));
        let mut process = handle(&spawner);

        assert!(matches!(
            process.terminate().unwrap_err(),
            ProcessError::NotStarted { .. }
        ));

        process.start().unwrap();
        process.terminate().unwrap();
        let exit = process.wait().await.unwrap();
        assert!(!exit.success());
        assert_eq!(process.status(), ProcessStatus::Exited);
        assert_eq!(process.exit(), Some(ProcessExit::signaled()));
    }
}
