use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{ProxyError, ProxyResult};

/// Run a command and capture its output. Fails if the command
/// returns a non-zero exit code; stderr is carried in the error so
/// callers can surface validator diagnostics.
pub fn run(program: &str, args: &[&str]) -> ProxyResult<String> {
    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(ProxyError::CommandFailed {
            command: format_command(program, args),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command with a deadline. The child is polled and killed if
/// it overruns, so a hung validator cannot stall a reconciliation.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> ProxyResult<String> {
    const POLL: Duration = Duration::from_millis(25);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            kill(&mut child);
            return Err(ProxyError::Timeout(timeout));
        }
        thread::sleep(POLL);
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if status.success() {
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    } else {
        Err(ProxyError::CommandFailed {
            command: format_command(program, args),
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        })
    }
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_error(program: &str, e: std::io::Error) -> ProxyError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProxyError::CommandNotFound(program.to_string())
    } else {
        ProxyError::Io(e)
    }
}

fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout() {
        let out = run("echo", &["hello"]).expect("echo failed");
        assert_eq!(out, "hello");
    }

    #[test]
    fn failure_carries_stderr() {
        let err = run("sh", &["-c", "echo oops >&2; exit 3"]).unwrap_err();
        match err {
            ProxyError::CommandFailed { stderr, status, .. } => {
                assert_eq!(stderr, "oops");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_not_found() {
        let err = run("definitely-not-a-real-binary", &[]).unwrap_err();
        assert!(matches!(err, ProxyError::CommandNotFound(_)));
    }

    #[test]
    fn timeout_kills_the_child() {
        let err = run_with_timeout("sleep", &["5"], Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ProxyError::Timeout(_)));
    }

    #[test]
    fn fast_command_beats_the_deadline() {
        let out = run_with_timeout("echo", &["ok"], Duration::from_secs(5)).expect("echo failed");
        assert_eq!(out, "ok");
    }
}
