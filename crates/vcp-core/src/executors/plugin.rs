//! Stdio plugin executor
//!
//! A plugin is a local command. Each call spawns it, writes the params as a
//! JSON object to stdin and reads one JSON response from stdout:
//!
//! ```text
//! {"status": "success", "result": "...", "messageForAI": "..."}
//! {"status": "error", "plugin_error": "..."}
//! ```

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::dispatch::{ExecutorError, ExecutorResult, ToolExecutor};
use crate::logging::Logger;
use crate::types::{CancellationToken, ToolParams};
use crate::{log_debug, log_warn};

/// Plugin process errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Failed to spawn plugin {plugin}: {source}")]
    Spawn {
        plugin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plugin exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("Invalid plugin response: {0}")]
    InvalidResponse(String),

    #[error("Plugin timed out after {0:?}")]
    Timeout(Duration),
}

pub type PluginResult<T> = Result<T, PluginError>;

/// How to launch one plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    /// Tool name the plugin answers to
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment, used for plugin settings
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PluginResponse {
    Success {
        #[serde(default)]
        result: Value,
        #[serde(rename = "messageForAI", default)]
        message_for_ai: Option<String>,
    },
    Error {
        plugin_error: String,
    },
}

/// Runs registered stdio plugins
pub struct PluginExecutor {
    plugins: HashMap<String, PluginSpec>,
    logger: Arc<dyn Logger>,
}

impl PluginExecutor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            plugins: HashMap::new(),
            logger,
        }
    }

    pub fn register(mut self, spec: PluginSpec) -> Self {
        self.plugins.insert(spec.name.clone(), spec);
        self
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    async fn run(&self, spec: &PluginSpec, params: &ToolParams) -> PluginResult<PluginResponse> {
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PluginError::Spawn {
                plugin: spec.name.clone(),
                source,
            })?;

        let input = serde_json::to_vec(params)
            .map_err(|e| PluginError::InvalidResponse(e.to_string()))?;
        let stdin = child.stdin.take();

        // Feed stdin while collecting output; a plugin may write before it reads
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A plugin may exit without reading its input
                if let Err(e) = stdin.write_all(&input).await {
                    log_debug!(self.logger, "[PluginExecutor] {} did not read stdin: {}", spec.name, e);
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        match parse_response(&stdout) {
            Ok(response) => Ok(response),
            Err(_) if !output.status.success() => Err(PluginError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ToolExecutor for PluginExecutor {
    async fn execute(
        &self,
        tool_name: &str,
        params: &ToolParams,
        cancel: CancellationToken,
    ) -> ExecutorResult<String> {
        let spec = self
            .plugins
            .get(tool_name)
            .ok_or_else(|| ExecutorError::UnknownTool(tool_name.to_string()))?;

        log_debug!(self.logger, "[PluginExecutor] Running {} ({})", spec.name, spec.command);

        let timeout = async {
            match spec.timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            outcome = self.run(spec, params) => outcome,
            _ = timeout => Err(PluginError::Timeout(spec.timeout.unwrap_or_default())),
        };

        match outcome {
            Ok(PluginResponse::Success { result, message_for_ai }) => {
                if let Some(message) = message_for_ai {
                    log_debug!(self.logger, "[PluginExecutor] {}: {}", spec.name, message);
                }
                Ok(match result {
                    Value::String(text) => text,
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
            }
            Ok(PluginResponse::Error { plugin_error }) => {
                Err(ExecutorError::failed(tool_name, plugin_error))
            }
            Err(PluginError::Spawn { plugin, source }) => {
                log_warn!(self.logger, "[PluginExecutor] Cannot start {}: {}", plugin, source);
                Err(ExecutorError::unavailable(format!("{}: {}", plugin, source)))
            }
            Err(e) => Err(ExecutorError::failed(tool_name, e.to_string())),
        }
    }
}

/// Parse stdout, accepting log lines before the final JSON line
fn parse_response(stdout: &str) -> PluginResult<PluginResponse> {
    let trimmed = stdout.trim();
    if let Ok(response) = serde_json::from_str(trimmed) {
        return Ok(response);
    }

    let last_line = trimmed.lines().rev().find(|line| !line.trim().is_empty());
    match last_line {
        Some(line) => serde_json::from_str(line.trim())
            .map_err(|e| PluginError::InvalidResponse(format!("{} in {:?}", e, line))),
        None => Err(PluginError::InvalidResponse("empty output".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_parse_response() {
        assert!(matches!(
            parse_response("{\"status\":\"success\",\"result\":\"hi\"}\n").unwrap(),
            PluginResponse::Success { result: Value::String(s), .. } if s == "hi"
        ));
        assert!(matches!(
            parse_response("loading...\n{\"status\":\"error\",\"plugin_error\":\"bad\"}").unwrap(),
            PluginResponse::Error { plugin_error } if plugin_error == "bad"
        ));
        assert!(parse_response("").is_err());
        assert!(parse_response("not json").is_err());
    }

    #[tokio::test]
    async fn test_unknown_plugin() {
        let executor = PluginExecutor::new(Arc::new(NoOpLogger));
        let err = executor
            .execute("Missing", &ToolParams::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::UnknownTool("Missing".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let executor = PluginExecutor::new(Arc::new(NoOpLogger))
            .register(PluginSpec::new("Ghost", "/nonexistent/vcp-plugin"));
        let err = executor
            .execute("Ghost", &ToolParams::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Unavailable(_)));
    }

    #[cfg(unix)]
    fn sh(name: &str, script: &str) -> PluginSpec {
        PluginSpec::new(name, "sh").with_args(["-c", script])
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_params_reach_plugin() {
        let executor = PluginExecutor::new(Arc::new(NoOpLogger)).register(sh(
            "Echo",
            r#"input=$(cat); printf '{"status":"success","result":%s}' "$input""#,
        ));

        let mut params = ToolParams::new();
        params.insert("city".to_string(), "Paris".to_string());
        let output = executor
            .execute("Echo", &params, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, r#"{"city":"Paris"}"#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plugin_env_and_error() {
        let executor = PluginExecutor::new(Arc::new(NoOpLogger)).register(
            sh(
                "Weather",
                r#"cat >/dev/null; printf '{"status":"error","plugin_error":"%s"}' "$REASON""#,
            )
            .with_env("REASON", "no such city"),
        );

        let err = executor
            .execute("Weather", &ToolParams::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Weather failed: no such city");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let executor = PluginExecutor::new(Arc::new(NoOpLogger))
            .register(sh("Broken", "cat >/dev/null; echo boom >&2; exit 3"));

        let err = executor
            .execute("Broken", &ToolParams::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plugin_writing_before_reading() {
        // Both outputs exceed a pipe buffer, so writing stdin first would block forever
        let executor = PluginExecutor::new(Arc::new(NoOpLogger)).register(
            sh(
                "Chatty",
                r#"printf '{"status":"success","result":"'; head -c 200000 /dev/zero | tr '\0' a; printf '"}'; cat >/dev/null"#,
            )
            .with_timeout(Duration::from_secs(10)),
        );

        let mut params = ToolParams::new();
        params.insert("body".to_string(), "b".repeat(200_000));
        let output = executor
            .execute("Chatty", &params, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.len(), 200_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let executor = PluginExecutor::new(Arc::new(NoOpLogger))
            .register(sh("Slow", "sleep 5").with_timeout(Duration::from_millis(50)));

        let err = executor
            .execute("Slow", &ToolParams::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled() {
        let executor =
            PluginExecutor::new(Arc::new(NoOpLogger)).register(sh("Slow", "sleep 5"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute("Slow", &ToolParams::new(), cancel)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutorError::Cancelled);
        assert_eq!(executor.plugin_names(), vec!["Slow"]);
    }
}
