//! govc Command Executor
//!
//! Runs the inventory CLI with session credentials in its environment,
//! bounded by a timeout and an output limit, and classifies failures.

use super::redact::{display_command, redact};
use crate::domain::ports::{CommandRunner, InventoryCommand, SessionContext};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the govc executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    /// Path or name of the govc binary
    pub cli_path: String,
    /// Per-command timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum bytes accepted on stdout or stderr
    pub max_output_bytes: usize,
    /// Let govc keep its authenticated session between invocations
    pub persist_session: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cli_path: "govc".to_string(),
            timeout_ms: 30_000,
            max_output_bytes: 4 * 1024 * 1024, // 4MB
            persist_session: true,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// =============================================================================
// Failure Classification
// =============================================================================

/// stderr fragments that mean the session or credentials were rejected
const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "not authenticated",
    "notauthenticated",
    "invalidlogin",
    "incorrect user name or password",
    "cannot complete login",
    "session is not authenticated",
    "authentication failed",
];

/// stderr fragments that mean the connection to the endpoint broke
const TRANSIENT_MARKERS: &[&str] = &[
    "connection reset",
    "connection refused",
    "broken pipe",
    "no route to host",
    "network is unreachable",
    "host is unreachable",
    "i/o timeout",
    "tls handshake timeout",
    "server closed idle connection",
];

/// Map a non-zero exit to an error. `stderr` and `stdout` must already be redacted.
pub fn classify_failure(command: String, code: Option<i32>, stderr: &str, stdout: &str) -> Error {
    let message = if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        match code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    };

    let lowered = message.to_lowercase();
    // "401" and "EOF" count only as standalone words
    let has_word = |wanted: &str| {
        lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == wanted)
    };

    if has_word("401") || AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Error::Auth(message);
    }

    if has_word("eof") || TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Error::TransientNetwork(message);
    }

    Error::Execution {
        command,
        code,
        message,
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executes inventory commands through the govc CLI
pub struct GovcExecutor {
    config: ExecutorConfig,
}

impl GovcExecutor {
    /// Create a new executor
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn build(&self, session: &SessionContext, command: &InventoryCommand) -> Command {
        let mut cmd = Command::new(&self.config.cli_path);
        cmd.arg(command.subcommand())
            .args(command.args())
            .env("GOVC_URL", session.endpoint())
            .env("GOVC_USERNAME", session.principal())
            .env("GOVC_PASSWORD", session.secret().expose())
            .env("GOVC_INSECURE", if session.insecure_tls() { "1" } else { "0" })
            .env(
                "GOVC_PERSIST_SESSION",
                if self.config.persist_session { "true" } else { "false" },
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one command to completion and return its trimmed stdout
    pub async fn execute(&self, session: &SessionContext, command: &InventoryCommand) -> Result<String> {
        let shown = display_command(&self.config.cli_path, session, command);
        debug!("Executing: {}", shown);

        let mut child = self.build(session, command).spawn().map_err(|e| Error::Execution {
            command: shown.clone(),
            code: None,
            message: format!("failed to start {}: {}", self.config.cli_path, e),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("child stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr was not captured".into()))?;

        let limit = self.config.max_output_bytes;
        let run = async {
            let (out, err) = tokio::try_join!(
                read_bounded(stdout, limit, &shown),
                read_bounded(stderr, limit, &shown),
            )?;
            let status = child.wait().await?;
            Ok::<_, Error>((status, out, err))
        };

        let outcome = timeout(self.config.timeout(), run).await;
        let (status, stdout, stderr) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(e);
            }
            Err(_) => {
                let _ = child.start_kill();
                warn!(
                    "Command timed out after {}ms: {}",
                    self.config.timeout_ms, shown
                );
                return Err(Error::CommandTimeout {
                    command: shown,
                    timeout: self.config.timeout(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).trim().to_string();
        if !status.success() {
            let stderr = redact(String::from_utf8_lossy(&stderr).trim(), session.secret());
            let stdout = redact(&stdout, session.secret());
            debug!("Command failed ({:?}): {}", status.code(), stderr);
            return Err(classify_failure(shown, status.code(), &stderr, &stdout));
        }

        // Inventory data is returned verbatim; only failure text is scrubbed
        Ok(stdout)
    }
}

#[async_trait]
impl CommandRunner for GovcExecutor {
    async fn run(&self, session: &SessionContext, command: &InventoryCommand) -> Result<String> {
        self.execute(session, command).await
    }
}

/// Read a stream to the end, failing once it grows past `limit` bytes
async fn read_bounded<R>(reader: R, limit: usize, command: &str) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .await?;

    if buf.len() > limit {
        return Err(Error::OutputLimitExceeded {
            command: command.to_string(),
            limit,
        });
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_classify_auth_failure() {
        let err = classify_failure(
            "govc find".into(),
            Some(1),
            "ServerFaultCode: 401 Unauthorized",
            "",
        );
        assert_matches!(err, Error::Auth(_));

        let err = classify_failure(
            "govc find".into(),
            Some(1),
            "Cannot complete login due to an incorrect user name or password.",
            "",
        );
        assert_matches!(err, Error::Auth(_));
    }

    #[test]
    fn test_classify_transient_failure() {
        let err = classify_failure(
            "govc ls".into(),
            Some(1),
            "Post \"https://vc/sdk\": read tcp 10.0.0.1:443: connection reset by peer",
            "",
        );
        assert_matches!(err, Error::TransientNetwork(_));

        let err = classify_failure("govc ls".into(), Some(1), "Post \"https://vc/sdk\": EOF", "");
        assert_matches!(err, Error::TransientNetwork(_));
    }

    #[test]
    fn test_classify_other_failure() {
        let err = classify_failure("govc ls".into(), Some(2), "", "");
        assert_matches!(
            err,
            Error::Execution { code: Some(2), ref message, .. } if message == "exited with status 2"
        );

        // "geofence" must not count as EOF
        let err = classify_failure("govc ls".into(), Some(1), "geofence policy denied", "");
        assert_matches!(err, Error::Execution { .. });
    }

    #[test]
    fn test_status_code_must_be_a_whole_word() {
        let err = classify_failure(
            "govc ls".into(),
            Some(1),
            "ls: path '/DC1/network/network-4012' not found",
            "",
        );
        assert_matches!(err, Error::Execution { .. });

        let err = classify_failure("govc ls".into(), Some(1), "HTTP 401: session expired", "");
        assert_matches!(err, Error::Auth(_));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        /// Write a fake govc script and return an executor pointed at it
        fn fake_govc(body: &str, config: ExecutorConfig) -> (TempDir, GovcExecutor) {
            let dir = TempDir::new().unwrap();
            let path: PathBuf = dir.path().join("govc");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

            let executor = GovcExecutor::new(ExecutorConfig {
                cli_path: path.to_string_lossy().into_owned(),
                ..config
            });
            (dir, executor)
        }

        fn session() -> SessionContext {
            SessionContext::new("https://vcenter.example.com", "svc@vsphere.local", "p@ss \"$`word")
                .unwrap()
        }

        #[tokio::test]
        async fn test_success_returns_trimmed_stdout() {
            let (_dir, executor) = fake_govc(
                "echo \"  $1 $GOVC_USERNAME $GOVC_INSECURE  \"",
                ExecutorConfig::default(),
            );
            let cmd = InventoryCommand::find(None, crate::domain::ObjectType::Datacenter, "DC1");

            let out = executor.execute(&session(), &cmd).await.unwrap();
            assert_eq!(out, "find svc@vsphere.local 1");
        }

        #[tokio::test]
        async fn test_auth_failure_is_classified_and_redacted() {
            let (_dir, executor) = fake_govc(
                "echo \"401: bad password $GOVC_PASSWORD\" >&2\nexit 1",
                ExecutorConfig::default(),
            );
            let cmd = InventoryCommand::list_ids("/DC1/network/vlan10");

            let err = executor.execute(&session(), &cmd).await.unwrap_err();
            assert_matches!(err, Error::Auth(_));
            assert!(!err.to_string().contains("p@ss \"$`word"));
        }

        #[tokio::test]
        async fn test_success_output_is_not_scrubbed() {
            let (_dir, executor) = fake_govc(
                "echo '{\"datastores\":[{\"summary\":{\"capacity\":4096,\"freeSpace\":2048}}]}'",
                ExecutorConfig::default(),
            );
            let session = SessionContext::new("https://vc", "svc", "2048").unwrap();
            let cmd = InventoryCommand::datastore_info("/DC1/datastore/ds1");

            let out = executor.execute(&session, &cmd).await.unwrap();
            assert!(out.contains("\"freeSpace\":2048"));
            assert!(serde_json::from_str::<serde_json::Value>(&out).is_ok());
        }

        #[tokio::test]
        async fn test_failure_output_is_scrubbed() {
            let (_dir, executor) = fake_govc(
                "echo \"rejected $GOVC_PASSWORD\"\nexit 3",
                ExecutorConfig::default(),
            );
            let session = SessionContext::new("https://vc", "svc", "admin").unwrap();
            let cmd = InventoryCommand::list_ids("/DC1/network/admin-net");

            let err = executor.execute(&session, &cmd).await.unwrap_err();
            assert_matches!(err, Error::Execution { ref message, .. } if !message.contains("admin"));
        }

        #[tokio::test]
        async fn test_transient_failure_is_classified() {
            let (_dir, executor) = fake_govc(
                "echo 'read tcp: connection reset by peer' >&2\nexit 1",
                ExecutorConfig::default(),
            );
            let cmd = InventoryCommand::list_ids("/DC1");

            let err = executor.execute(&session(), &cmd).await.unwrap_err();
            assert_matches!(err, Error::TransientNetwork(_));
        }

        #[tokio::test]
        async fn test_timeout_kills_command() {
            let (_dir, executor) = fake_govc(
                "sleep 10",
                ExecutorConfig {
                    timeout_ms: 200,
                    ..ExecutorConfig::default()
                },
            );
            let cmd = InventoryCommand::list_ids("/DC1");

            let started = std::time::Instant::now();
            let err = executor.execute(&session(), &cmd).await.unwrap_err();
            assert_matches!(err, Error::CommandTimeout { .. });
            assert!(started.elapsed() < Duration::from_secs(5));
            assert!(!err.to_string().contains("p@ss"));
        }

        #[tokio::test]
        async fn test_output_limit_is_a_failure() {
            let (_dir, executor) = fake_govc(
                "head -c 100000 /dev/zero",
                ExecutorConfig {
                    max_output_bytes: 1024,
                    ..ExecutorConfig::default()
                },
            );
            let cmd = InventoryCommand::datastore_info("/DC1/datastore/ds1");

            let err = executor.execute(&session(), &cmd).await.unwrap_err();
            assert_matches!(err, Error::OutputLimitExceeded { limit: 1024, .. });
        }

        #[tokio::test]
        async fn test_missing_binary_is_execution_error() {
            let executor = GovcExecutor::new(ExecutorConfig {
                cli_path: "/nonexistent/govc".into(),
                ..ExecutorConfig::default()
            });
            let cmd = InventoryCommand::list_ids("/DC1");

            let err = executor.execute(&session(), &cmd).await.unwrap_err();
            assert_matches!(err, Error::Execution { code: None, .. });
        }
    }
}
