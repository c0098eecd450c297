use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Lang;
use crate::error::{Error, Result};
use super::traits::{Translator, TranslatorInfo};

/// Default time allowed for one command invocation
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Translator backed by an external shell command.
///
/// The command receives one UTF-8 line per item on stdin and must print the
/// same number of lines on stdout. It runs through `/bin/sh -lc`, so pipes
/// and login-shell environment are available.
pub struct CommandTranslator {
    command: String,
    timeout: Duration,
}

impl CommandTranslator {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output> {
        let mut child = Command::new("/bin/sh")
            .arg("-lc")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::TranslationCommand {
                status: "spawn failed".to_string(),
                stderr: e.to_string(),
            })?;

        // Feed stdin concurrently so a chatty command cannot deadlock on a full pipe
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("Translator command closed stdin early: {}", e);
                }
            })
        });

        let output = child.wait_with_output().await?;
        if let Some(writer) = writer {
            let _ = writer.await;
        }
        Ok(output)
    }
}

#[async_trait]
impl Translator for CommandTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "Command",
            requires_api_key: false,
            supports_auto_detect: true,
        }
    }

    async fn translate_lines(&self, lines: &[String], _source: &Lang, _target: &Lang) -> Result<Vec<String>> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut payload = lines.join("\n");
        payload.push('\n');

        debug!("Running translator command on {} lines", lines.len());
        let output = tokio::time::timeout(self.timeout, self.run(payload.into_bytes()))
            .await
            .map_err(|_| Error::TranslationTimeout)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Translator command failed: {}", output.status);
            return Err(Error::TranslationCommand {
                status: output.status.to_string(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    async fn run(cmd: &str, input: &[&str]) -> Result<Vec<String>> {
        CommandTranslator::new(cmd, Duration::from_secs(10))
            .translate_lines(&lines(input), &Lang::new("fr"), &Lang::new("en"))
            .await
    }

    #[tokio::test]
    async fn test_line_for_line_output() {
        let out = run("tr a-z A-Z", &["devant", "dos"]).await.unwrap();
        assert_eq!(out, vec!["DEVANT", "DOS"]);
    }

    #[tokio::test]
    async fn test_count_is_not_enforced_here() {
        let out = run("head -n 1", &["a", "b", "c"]).await.unwrap();
        assert_eq!(out, vec!["a"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let err = run("echo broken >&2; exit 3", &["a"]).await.unwrap_err();
        match err {
            Error::TranslationCommand { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let translator = CommandTranslator::new("sleep 5", Duration::from_millis(100));
        let err = translator
            .translate_lines(&lines(&["a"]), &Lang::new("fr"), &Lang::new("en"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranslationTimeout));
    }

    #[tokio::test]
    async fn test_empty_input_skips_command() {
        let out = run("exit 1", &[]).await.unwrap();
        assert!(out.is_empty());
    }
}
