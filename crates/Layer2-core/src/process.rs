//! Subprocess helpers
//!
//! Every child is spawned with `kill_on_drop`; when the cancellation token
//! fires the child is killed explicitly and `Error::Cancelled` is returned.

use kiln_foundation::{Error, Result};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What a finished child wrote
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        combined.push_str(&self.stderr);
        combined
    }
}

/// Shell-quoted command line, for logs and error messages
pub fn command_line<'a>(program: &'a str, args: impl IntoIterator<Item = &'a str>) -> String {
    let words: Vec<&str> = std::iter::once(program).chain(args).collect();
    shlex::try_join(words.iter().copied()).unwrap_or_else(|_| words.join(" "))
}

/// Run `command` with captured output until it exits or `cancel` fires.
pub async fn run_captured(
    mut command: Command,
    line: &str,
    cancel: &CancellationToken,
) -> Result<ProcessOutput> {
    command
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command = line, "Spawning subprocess");
    let mut child = command
        .spawn()
        .map_err(|e| Error::subprocess(line, e))?;

    let stdout = tokio::spawn(read_all(child.stdout.take()));
    let stderr = tokio::spawn(read_all(child.stderr.take()));

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| Error::subprocess(line, e))?,
        _ = cancel.cancelled() => {
            warn!(command = line, "Cancelled, killing subprocess");
            let _ = child.kill().await;
            return Err(Error::Cancelled);
        }
    };

    Ok(ProcessOutput {
        status,
        stdout: stdout.await.unwrap_or_default(),
        stderr: stderr.await.unwrap_or_default(),
    })
}

/// Run `command` sharing this process's stdio.
pub async fn run_inherited(
    mut command: Command,
    line: &str,
    cancel: &CancellationToken,
) -> Result<ExitStatus> {
    command
        .kill_on_drop(true)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!(command = line, "Spawning subprocess with inherited stdio");
    let mut child = command
        .spawn()
        .map_err(|e| Error::subprocess(line, e))?;

    tokio::select! {
        status = child.wait() => status.map_err(|e| Error::subprocess(line, e)),
        _ = cancel.cancelled() => {
            warn!(command = line, "Cancelled, killing subprocess");
            let _ = child.kill().await;
            Err(Error::Cancelled)
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            warn!("Failed to read subprocess output: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_words() {
        let line = command_line("go", ["build", "-ldflags", "-X main.Version=1"]);
        assert!(line.starts_with("go build -ldflags "));
        assert_eq!(
            shlex::split(&line).unwrap(),
            vec!["go", "build", "-ldflags", "-X main.Version=1"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captured_collects_output() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 3"]);

        let output = run_captured(command, "sh -c ...", &CancellationToken::new())
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_child() {
        let cancel = CancellationToken::new();
        let mut command = Command::new("sleep");
        command.arg("30");

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = run_captured(command, "sleep 30", &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_binary_is_subprocess_error() {
        let command = Command::new("kiln-definitely-not-a-real-binary");
        let err = run_inherited(command, "kiln-definitely-not-a-real-binary", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Subprocess { .. }));
    }
}
