//! Shell execution for the vault shell tool.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;

pub(crate) const SHELL_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const SHELL_OUTPUT_MAX_BYTES: usize = 65_536;

/// Platform default shell and the flag that makes it run one command line.
pub fn default_shell() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("pwsh.exe", "-Command")
    } else {
        ("bash", "-c")
    }
}

/// Result of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// stdout and stderr interleaved in arrival order.
    pub output: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Join a command and its arguments into one shell command line.
pub fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `command args...` through the default shell with `cwd` as working directory.
///
/// The child is killed if the returned future is dropped, which is how turn
/// cancellation releases a running command.
pub async fn run_shell(cwd: &Path, command: &str, args: &[String]) -> std::io::Result<ShellOutput> {
    let (shell, flag) = default_shell();
    let line = command_line(command, args);
    tracing::debug!(shell, cwd = %cwd.display(), command = %line, "spawning shell command");

    let mut child = Command::new(shell)
        .arg(flag)
        .arg(&line)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let combined = Arc::new(Mutex::new(Vec::new()));
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (status, out, err) = tokio::join!(
        child.wait(),
        drain(stdout, Arc::clone(&combined)),
        drain(stderr, Arc::clone(&combined)),
    );
    out?;
    err?;
    let status = status?;

    let bytes = combined.lock().await;
    Ok(ShellOutput {
        output: truncate_utf8(&String::from_utf8_lossy(&bytes), SHELL_OUTPUT_MAX_BYTES),
        exit_code: status.code(),
    })
}

async fn drain<R>(reader: Option<R>, sink: Arc<Mutex<Vec<u8>>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        sink.lock().await.extend_from_slice(&buf[..n]);
    }
}

pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    s[..cutoff].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_args_with_spaces() {
        let line = command_line("ls", &["-la".into(), "notes".into()]);
        assert_eq!(line, "ls -la notes");
        assert_eq!(command_line("pwd", &[]), "pwd");
    }

    #[test]
    fn truncate_utf8_never_splits_codepoints() {
        let s = "ab\u{1F600}cd";
        assert_eq!(truncate_utf8(s, 2), "ab");
        assert_eq!(truncate_utf8(s, 3), "ab");
        assert_eq!(truncate_utf8(s, 6), "ab\u{1F600}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run_shell(dir.path(), "echo out; echo err >&2; exit 2", &[])
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(2));
        assert!(!result.success());
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_the_given_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.md"), "").unwrap();

        let result = run_shell(dir.path(), "ls", &[]).await.unwrap();
        assert!(result.success());
        assert!(result.output.contains("marker.md"));
    }
}
