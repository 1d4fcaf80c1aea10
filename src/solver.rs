//! Child-process driver for the external SMT solver.
//!
//! The solver is reached over its wire protocol only: the SMT-LIB script
//! goes to the child's stdin (closing stdin signals end-of-input), stdout
//! and stderr are drained on background threads, and the calling thread
//! polls for exit against a wall-clock deadline. On timeout the child is
//! killed and reaped; no exit path leaves an orphan process or an open
//! pipe behind.
//!
//! Result interpretation is layered on top in [`check_script`]: the first
//! line of stdout decides `sat` (counter-example in the remaining output),
//! `unsat`, or an inconclusive error.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from driving the solver process.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver command is empty")]
    EmptyCommand,

    #[error("failed to spawn solver '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to feed script to solver: {0}")]
    Stdin(std::io::Error),

    #[error("failed to await solver exit: {0}")]
    Wait(std::io::Error),

    #[error("solver timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("solver gave no verdict (first line {first_line:?}); stderr: {stderr}")]
    Inconclusive { first_line: String, stderr: String },
}

/// Raw text collected from a solver run.
#[derive(Debug, Clone, Default)]
pub struct SolverOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Classified solver answer for one (negated) VC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverVerdict {
    /// The negated VC is satisfiable: the condition is refuted and `model`
    /// quotes the `(get-model)` block verbatim.
    Sat { model: String },
    /// The negated VC is unsatisfiable: the condition holds.
    Unsat,
}

/// Run `cmd` with `script` on stdin, collecting stdout/stderr until the
/// child exits or `timeout` elapses.
///
/// A non-zero exit is not an error here; the exit code is appended to the
/// collected stderr as a line `execution failed (exit code=N)`.
///
/// # Errors
/// Fails on an empty command, spawn failure, stdin write failure (other
/// than the child closing its end early), wait failure, and timeout.
pub fn run_solver(
    cmd: &[String],
    script: &str,
    timeout: Duration,
) -> Result<SolverOutput, SolverError> {
    let (program, args) = cmd.split_first().ok_or(SolverError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SolverError::Spawn {
            command: program.clone(),
            source,
        })?;

    let stdout_reader = child.stdout.take().map(drain_pipe);
    let stderr_reader = child.stderr.take().map(drain_pipe);

    // Write the script, then drop the handle so the child sees EOF. A
    // broken pipe just means the child stopped reading; its own output
    // and exit status carry the diagnosis.
    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(script.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                join_reader(stdout_reader);
                join_reader(stderr_reader);
                return Err(SolverError::Stdin(e));
            }
        }
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    join_reader(stdout_reader);
                    join_reader(stderr_reader);
                    return Err(SolverError::Timeout(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                join_reader(stdout_reader);
                join_reader(stderr_reader);
                return Err(SolverError::Wait(e));
            }
        }
    };

    let stdout = join_reader(stdout_reader);
    let mut stderr = join_reader(stderr_reader);

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("execution failed (exit code={code})\n"));
    }

    Ok(SolverOutput { stdout, stderr })
}

/// Run the script and classify the solver's answer.
///
/// # Errors
/// Propagates [`run_solver`] errors; additionally fails with
/// [`SolverError::Inconclusive`] when the first stdout line is neither
/// `sat` nor `unsat` (`unknown` included).
pub fn check_script(
    cmd: &[String],
    script: &str,
    timeout: Duration,
) -> Result<SolverVerdict, SolverError> {
    let output = run_solver(cmd, script, timeout)?;

    let mut parts = output.stdout.splitn(2, '\n');
    let first_line = parts.next().unwrap_or("").trim();
    match first_line {
        "sat" => Ok(SolverVerdict::Sat {
            model: parts.next().unwrap_or("").trim().to_string(),
        }),
        "unsat" => Ok(SolverVerdict::Unsat),
        other => Err(SolverError::Inconclusive {
            first_line: other.to_string(),
            stderr: output.stderr.trim().to_string(),
        }),
    }
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        let _ = pipe.read_to_string(&mut text);
        text
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    const LONG: Duration = Duration::from_secs(10);

    // ==================== run_solver ====================

    #[test]
    fn test_collects_stdout_and_stderr() {
        let out = run_solver(&sh("echo out; echo err >&2"), "", LONG).expect("run");
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn test_script_reaches_stdin() {
        let out = run_solver(&sh("cat"), "(check-sat)\n", LONG).expect("run");
        assert_eq!(out.stdout, "(check-sat)\n");
    }

    #[test]
    fn test_nonzero_exit_appends_line_not_error() {
        let out = run_solver(&sh("echo unsat; exit 3"), "", LONG).expect("run");
        assert_eq!(out.stdout.trim(), "unsat");
        assert!(
            out.stderr.contains("execution failed (exit code=3)"),
            "stderr was: {:?}",
            out.stderr
        );
    }

    #[test]
    fn test_spawn_failure() {
        let cmd = vec!["definitely-not-a-real-solver-binary".to_string()];
        let err = run_solver(&cmd, "", LONG).expect_err("must fail");
        assert!(matches!(err, SolverError::Spawn { .. }));
    }

    #[test]
    fn test_empty_command() {
        let err = run_solver(&[], "", LONG).expect_err("must fail");
        assert!(matches!(err, SolverError::EmptyCommand));
    }

    #[test]
    fn test_timeout_kills_child_within_bound() {
        let timeout = Duration::from_secs(1);
        let start = Instant::now();
        let err = run_solver(&sh("sleep 30"), "", timeout).expect_err("must time out");
        let elapsed = start.elapsed();

        assert!(matches!(err, SolverError::Timeout(_)));
        // Bound: timeout plus scheduling slack, nowhere near the child's
        // 30s sleep. The kill+wait in the timeout path reaps the child.
        assert!(
            elapsed < Duration::from_secs(5),
            "took {elapsed:?}, child was not killed promptly"
        );
    }

    #[test]
    fn test_child_ignoring_stdin_is_fine() {
        // `true` exits without reading; the broken pipe must not surface.
        let out = run_solver(&sh("exit 0"), "(assert true)\n", LONG).expect("run");
        assert_eq!(out.stdout, "");
    }

    // ==================== check_script ====================

    #[test]
    fn test_unsat_verdict() {
        let v = check_script(&sh("echo unsat"), "", LONG).expect("check");
        assert_eq!(v, SolverVerdict::Unsat);
    }

    #[test]
    fn test_sat_verdict_carries_model() {
        let v = check_script(&sh("echo sat; echo '(model (define-fun x () Int (- 1)))'"), "", LONG)
            .expect("check");
        let SolverVerdict::Sat { model } = v else {
            panic!("expected sat");
        };
        assert!(model.contains("define-fun x"));
    }

    #[test]
    fn test_first_line_is_trimmed() {
        let v = check_script(&sh("echo '  unsat  '"), "", LONG).expect("check");
        assert_eq!(v, SolverVerdict::Unsat);
    }

    #[test]
    fn test_unknown_is_inconclusive() {
        let err = check_script(&sh("echo unknown"), "", LONG).expect_err("must fail");
        assert!(
            matches!(err, SolverError::Inconclusive { ref first_line, .. } if first_line == "unknown")
        );
    }

    #[test]
    fn test_garbage_is_inconclusive_with_stderr_context() {
        let err = check_script(&sh("echo '(error \"bad sort\")'; echo oops >&2; exit 1"), "", LONG)
            .expect_err("must fail");
        let SolverError::Inconclusive { stderr, .. } = err else {
            panic!("expected inconclusive");
        };
        assert!(stderr.contains("oops"));
        assert!(stderr.contains("execution failed (exit code=1)"));
    }
}
