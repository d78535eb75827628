//! Fake process spawner for tests

use super::spawner::{ChildProcess, Invocation, ProcessSpawner};
#[cfg(unix)]
use super::spawner::SystemSpawner;
use super::types::{CommandLine, ProcessExit};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// What a fake child does once spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Exit immediately with this code
    Exit(i32),
    /// Refuse to spawn, as if the executable were missing
    FailToSpawn,
    /// Block in `wait` until killed
    RunUntilKilled,
}

/// One recorded spawn
#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub command: CommandLine,
    pub has_stdin: bool,
    pub has_stdout: bool,
}

/// Records every invocation instead of launching programs
#[derive(Default)]
pub struct FakeSpawner {
    default_behavior: Option<FakeBehavior>,
    behaviors: HashMap<String, FakeBehavior>,
    spawned: Mutex<Vec<SpawnRecord>>,
    kills: Arc<Mutex<Vec<String>>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        Self {
            default_behavior: Some(behavior),
            ..Self::default()
        }
    }

    /// Override the behavior for one program
    pub fn program(mut self, program: &str, behavior: FakeBehavior) -> Self {
        self.behaviors.insert(program.to_string(), behavior);
        self
    }

    /// Successful spawns, in order
    pub fn spawned(&self) -> Vec<SpawnRecord> {
        self.spawned.lock().clone()
    }

    /// Programs that received a kill request, in order
    pub fn kills(&self) -> Vec<String> {
        self.kills.lock().clone()
    }

    fn behavior(&self, program: &str) -> FakeBehavior {
        self.behaviors
            .get(program)
            .copied()
            .or(self.default_behavior)
            .unwrap_or(FakeBehavior::Exit(0))
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, invocation: Invocation) -> std::io::Result<Box<dyn ChildProcess>> {
        let behavior = self.behavior(&invocation.command.program);
        if behavior == FakeBehavior::FailToSpawn {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", invocation.command.program),
            ));
        }

        self.spawned.lock().push(SpawnRecord {
            command: invocation.command.clone(),
            has_stdin: invocation.stdin.is_some(),
            has_stdout: invocation.stdout.is_some(),
        });

        Ok(Box::new(FakeChild {
            program: invocation.command.program,
            behavior,
            killed: Arc::new(Notify::new()),
            kills: self.kills.clone(),
        }))
    }
}

struct FakeChild {
    program: String,
    behavior: FakeBehavior,
    killed: Arc<Notify>,
    kills: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChildProcess for FakeChild {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> std::io::Result<ProcessExit> {
        match self.behavior {
            FakeBehavior::Exit(code) => Ok(ProcessExit::from_code(code)),
            FakeBehavior::RunUntilKilled => {
                self.killed.notified().await;
                Ok(ProcessExit::signaled())
            }
            FakeBehavior::FailToSpawn => Ok(ProcessExit::from_code(127)),
        }
    }

    fn start_kill(&mut self) -> std::io::Result<()> {
        self.kills.lock().push(self.program.clone());
        self.killed.notify_one();
        Ok(())
    }
}

/// Runs `sh -c` scripts in place of the camera and ffmpeg
#[cfg(unix)]
pub struct ScriptSpawner {
    capture: String,
    mux: String,
}

#[cfg(unix)]
impl ScriptSpawner {
    pub fn new(capture: &str, mux: &str) -> Self {
        Self {
            capture: capture.to_string(),
            mux: mux.to_string(),
        }
    }
}

#[cfg(unix)]
impl ProcessSpawner for ScriptSpawner {
    fn spawn(&self, invocation: Invocation) -> std::io::Result<Box<dyn ChildProcess>> {
        let script = if invocation.command.program == "ffmpeg" {
            &self.mux
        } else {
            &self.capture
        };
        let command = CommandLine::new("sh", vec!["-c".to_string(), script.clone()]);
        SystemSpawner.spawn(Invocation {
            command,
            ..invocation
        })
    }
}
