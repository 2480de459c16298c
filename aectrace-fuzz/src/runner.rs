// SPDX-License-Identifier: Apache-2.0

//! Boundary to the instrumented program: given a candidate input, produce
//! the traces of running it.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use aectrace::TraceSource;

#[derive(Debug)]
pub enum RunnerError {
    Spawn {
        program: PathBuf,
        error: io::Error,
    },
    ExitStatus {
        program: PathBuf,
        status: ExitStatus,
    },
    MissingTraceFile {
        path: PathBuf,
    },
    /// A trace file from the previous run could not be deleted.
    RemoveStaleTrace {
        path: PathBuf,
        error: io::Error,
    },
    /// Failure reported by a non-process runner.
    Other(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Spawn { program, error } => {
                write!(f, "could not run {}: {}", program.display(), error)
            }
            RunnerError::ExitStatus { program, status } => {
                write!(f, "{} exited with {}", program.display(), status)
            }
            RunnerError::MissingTraceFile { path } => {
                write!(f, "runner did not produce trace file {}", path.display())
            }
            RunnerError::RemoveStaleTrace { path, error } => {
                write!(f, "cannot remove stale trace file {}: {}", path.display(), error)
            }
            RunnerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Spawn { error, .. } | RunnerError::RemoveStaleTrace { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}

/// Runs the program under test on one input. Blocking; no timeout is
/// imposed here.
pub trait TraceRunner {
    fn run(&mut self, input: &str) -> Result<Vec<TraceSource>, RunnerError>;
}

impl<F> TraceRunner for F
where
    F: FnMut(&str) -> Result<Vec<TraceSource>, RunnerError>,
{
    fn run(&mut self, input: &str) -> Result<Vec<TraceSource>, RunnerError> {
        self(input)
    }
}

/// Invokes `<program> <args...> <input>` and returns the trace files the
/// program is expected to write.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    args: Vec<String>,
    trace_files: Vec<PathBuf>,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, trace_files: Vec<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            trace_files,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn trace_files(&self) -> &[PathBuf] {
        &self.trace_files
    }

    // Traces left over from a previous input must not be mistaken for the
    // output of this one.
    fn remove_stale_traces(&self) -> Result<(), RunnerError> {
        for path in self.trace_files.iter() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(RunnerError::RemoveStaleTrace {
                        path: path.clone(),
                        error,
                    })
                }
            }
        }
        Ok(())
    }
}

impl TraceRunner for CommandRunner {
    fn run(&mut self, input: &str) -> Result<Vec<TraceSource>, RunnerError> {
        self.remove_stale_traces()?;
        log::debug!("running {} on {:?}", self.program.display(), input);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|error| RunnerError::Spawn {
                program: self.program.clone(),
                error,
            })?;
        if !status.success() {
            return Err(RunnerError::ExitStatus {
                program: self.program.clone(),
                status,
            });
        }
        self.trace_files
            .iter()
            .map(|path| {
                if path.is_file() {
                    Ok(TraceSource::File(path.clone()))
                } else {
                    Err(RunnerError::MissingTraceFile { path: path.clone() })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_runners() {
        let mut calls = Vec::new();
        let mut runner = |input: &str| {
            calls.push(input.to_string());
            Ok::<_, RunnerError>(vec![TraceSource::Text(format!("BEGIN {}\n", input))])
        };
        let traces = TraceRunner::run(&mut runner, "abc").unwrap();
        assert_eq!(traces, vec![TraceSource::Text("BEGIN abc\n".to_string())]);
        assert_eq!(calls, vec!["abc".to_string()]);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut runner = CommandRunner::new(
            tmp.path().join("no-such-program"),
            vec![],
            vec![tmp.path().join("main.log")],
        );
        assert!(matches!(runner.run("x"), Err(RunnerError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_writes_its_trace() {
        let tmp = tempfile::tempdir().unwrap();
        let trace = tmp.path().join("main.log");
        let script = format!(
            "printf 'BEGIN m\\nBRANCH(1,0,1)\\n# End %s\\n' \"$0\" > {}",
            trace.display()
        );
        let mut runner =
            CommandRunner::new("sh", vec!["-c".to_string(), script], vec![trace.clone()]);
        assert_eq!(runner.program(), Path::new("sh"));
        assert_eq!(runner.trace_files(), &[trace.clone()]);
        let traces = runner.run("in1").unwrap();
        assert_eq!(traces, vec![TraceSource::File(trace.clone())]);
        assert_eq!(
            std::fs::read_to_string(&trace).unwrap(),
            "BEGIN m\nBRANCH(1,0,1)\n# End in1\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_and_missing_trace_are_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let trace = tmp.path().join("main.log");
        let mut failing = CommandRunner::new(
            "sh",
            vec!["-c".to_string(), "exit 3".to_string()],
            vec![trace.clone()],
        );
        assert!(matches!(
            failing.run("x"),
            Err(RunnerError::ExitStatus { .. })
        ));

        std::fs::write(&trace, "BEGIN stale\n").unwrap();
        let mut silent = CommandRunner::new(
            "sh",
            vec!["-c".to_string(), "true".to_string()],
            vec![trace.clone()],
        );
        match silent.run("x") {
            Err(RunnerError::MissingTraceFile { path }) => assert_eq!(path, trace),
            other => panic!("expected a missing trace, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_stale_trace_is_reported_as_such() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory in place of the trace file cannot be removed with
        // remove_file.
        let trace = tmp.path().join("main.log");
        std::fs::create_dir(&trace).unwrap();
        let mut runner = CommandRunner::new(
            "sh",
            vec!["-c".to_string(), "true".to_string()],
            vec![trace.clone()],
        );
        let err = runner.run("x").unwrap_err();
        assert!(err.to_string().starts_with("cannot remove stale trace file"));
        match err {
            RunnerError::RemoveStaleTrace { path, .. } => assert_eq!(path, trace),
            other => panic!("expected a stale trace error, got {:?}", other),
        }
    }
}
