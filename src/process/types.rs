//! Process types
//!
//! Command lines, exit reports and errors shared by every external process
//! the pipeline drives.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An executable together with its ordered argument vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    /// Executable name, resolved through `PATH`
    pub program: String,
    /// Arguments in the order they are passed
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How an external process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when the process was ended by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn signaled() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Observable lifecycle state of a process handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Arguments built, nothing spawned yet
    Constructed,
    /// Spawned and not yet waited on
    Running,
    /// Waited on and exited successfully
    Exited,
    /// Failed to spawn, or exited unsuccessfully
    Failed,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessStatus::Constructed => "constructed",
            ProcessStatus::Running => "running",
            ProcessStatus::Exited => "exited",
            ProcessStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{program}: not started")]
    NotStarted { program: String },

    #[error("{program}: already started")]
    AlreadyStarted { program: String },

    #[error("{program}: already waited")]
    AlreadyWaited { program: String },

    #[error("{program}: failed to create output pipe: {source}")]
    Pipe {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program}: failed to spawn: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program}: failed while waiting: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program}: {exit}")]
    Exited { program: String, exit: ProcessExit },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_display() {
        let command = CommandLine::new("raspivid", vec!["-o".into(), "-".into()]);
        assert_eq!(command.to_string(), "raspivid -o -");
    }

    #[test]
    fn test_exit_success() {
        assert!(ProcessExit::from_code(0).success());
        assert!(!ProcessExit::from_code(1).success());
        assert!(!ProcessExit::signaled().success());
        assert_eq!(ProcessExit::signaled().to_string(), "terminated by signal");
    }

    #[test]
    fn test_error_messages() {
        let err = ProcessError::NotStarted {
            program: "ffmpeg".into(),
        };
        assert_eq!(err.to_string(), "ffmpeg: not started");

        let err = ProcessError::Exited {
            program: "ffmpeg".into(),
            exit: ProcessExit::from_code(1),
        };
        assert_eq!(err.to_string(), "ffmpeg: exit code 1");
    }
}
