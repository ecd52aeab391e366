use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// How to invoke the `claude` CLI for one advisor.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
    /// Executable name or path.
    pub binary: String,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(8),
            binary: "claude".to_string(),
        }
    }
}

impl ClaudeCliConfig {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            ..Self::default()
        }
    }

    /// Arguments for a one-shot print run. The user prompt is sent on stdin.
    fn args<'a>(&'a self, system_prompt: &'a str) -> [&'a str; 7] {
        [
            "-p",
            "--system-prompt",
            system_prompt,
            "--model",
            self.model.as_str(),
            "--output-format",
            "json",
        ]
    }
}

/// The wrapper object printed by `--output-format json`.
#[derive(Debug, Deserialize)]
struct CliEnvelope {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// The advisor's text from CLI stdout. Falls back to the raw text when stdout
/// is not a result envelope.
fn unwrap_envelope(stdout: &str) -> Result<String, AgentError> {
    match serde_json::from_str::<CliEnvelope>(stdout.trim()) {
        Ok(envelope) if envelope.is_error => Err(AgentError::Upstream(envelope.result)),
        Ok(envelope) => Ok(envelope.result),
        Err(_) => Ok(stdout.to_string()),
    }
}

/// Run the CLI once and return the advisor's raw reply.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(model = %config.model, binary = %config.binary, "Invoking claude CLI");

    let run = async {
        let mut child = Command::new(&config.binary)
            .args(config.args(system_prompt))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Cli(format!("Failed to spawn {}: {e}", config.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(user_prompt.as_bytes())
                .await
                .map_err(|e| AgentError::Cli(format!("Failed to write prompt: {e}")))?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::Cli(format!("Failed to read claude output: {e}")))
    };

    let output = tokio::time::timeout(config.timeout, run)
        .await
        .map_err(|_| AgentError::Timeout(config.timeout))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Upstream(format!(
            "claude exited {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let reply = unwrap_envelope(&String::from_utf8_lossy(&output.stdout))?;
    if reply.trim().is_empty() {
        return Err(AgentError::Upstream("claude returned an empty reply".to_string()));
    }
    Ok(reply)
}

/// Whether the configured CLI binary runs at all.
pub async fn check_cli_available() -> bool {
    check_binary_available(&ClaudeCliConfig::default().binary).await
}

pub async fn check_binary_available(binary: &str) -> bool {
    matches!(
        Command::new(binary).arg("--version").output().await,
        Ok(output) if output.status.success()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClaudeCliConfig::default();
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.timeout, Duration::from_secs(8));
        assert_eq!(config.binary, "claude");
    }

    #[test]
    fn args_request_json_output() {
        let config = ClaudeCliConfig::new("claude-3-5-sonnet-latest".to_string(), Duration::from_secs(3));
        let args = config.args("be brief");
        assert_eq!(args[2], "be brief");
        assert_eq!(args[4], "claude-3-5-sonnet-latest");
        assert_eq!(&args[5..], ["--output-format", "json"]);
    }

    #[test]
    fn envelope_result_is_unwrapped() {
        let stdout = r#"{"type":"result","is_error":false,"result":"{\"analysis_text\":\"Save ₹5,000.\"}"}"#;
        assert_eq!(
            unwrap_envelope(stdout).unwrap(),
            r#"{"analysis_text":"Save ₹5,000."}"#
        );
    }

    #[test]
    fn envelope_error_is_upstream() {
        let stdout = r#"{"type":"result","is_error":true,"result":"rate limited"}"#;
        assert!(matches!(
            unwrap_envelope(stdout),
            Err(AgentError::Upstream(msg)) if msg == "rate limited"
        ));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(unwrap_envelope("Keep ₹3 lakh aside.\n").unwrap(), "Keep ₹3 lakh aside.\n");
    }

    #[tokio::test]
    async fn missing_binary_is_a_cli_error() {
        let config = ClaudeCliConfig {
            binary: "fincouncil-no-such-binary".to_string(),
            ..ClaudeCliConfig::default()
        };
        assert!(!check_binary_available(&config.binary).await);
        assert!(matches!(
            invoke_claude("system", "user", &config).await,
            Err(AgentError::Cli(_))
        ));
    }
}
