use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use provider_core::{ErrorKind, FetchPayload, ProviderError, WorkerCommand};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::classify::call_failure;
use crate::protocol::WorkerResponse;

/// Launches one worker process per call. Isolation is the point: the
/// upstream library is only safe to drive from a fresh process, and a
/// hung call must be killable without touching anything else.
#[derive(Debug, Clone)]
pub struct WorkerGateway {
    command: WorkerCommand,
}

/// How the parameters travel to the worker. The temp file is held open
/// until the process exits so the path stays valid.
enum ParamArtifact {
    File(tempfile::NamedTempFile),
    Inline(String),
}

impl ParamArtifact {
    fn argument(&self) -> String {
        match self {
            ParamArtifact::File(file) => file.path().to_string_lossy().into_owned(),
            ParamArtifact::Inline(json) => json.clone(),
        }
    }
}

impl WorkerGateway {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    /// One attempt: spawn, enforce the budget, decode, parse the envelope.
    /// No retry logic lives here.
    pub async fn invoke_once(
        &self,
        endpoint: &str,
        params: &Map<String, Value>,
        budget: Duration,
    ) -> Result<FetchPayload, ProviderError> {
        let artifact = prepare_params(params)?;

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg(endpoint)
            .arg(artifact.argument())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(endpoint, budget_secs = budget.as_secs(), "spawning worker");

        let child = cmd.spawn().map_err(|e| ProviderError::Call {
            kind: ErrorKind::ProcessFailure,
            message: format!("failed to spawn worker '{}': {e}", self.command.program),
            hints: vec![],
        })?;

        // Dropping the future on expiry kills the child via kill_on_drop.
        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProviderError::Call {
                    kind: ErrorKind::ProcessFailure,
                    message: format!("failed to collect worker output: {e}"),
                    hints: vec![],
                })
            }
            Err(_) => {
                tracing::warn!(endpoint, budget_secs = budget.as_secs(), "worker call expired");
                return Err(call_failure(
                    ErrorKind::Timeout,
                    format!(
                        "{endpoint} timed out after {}s (worker killed)",
                        budget.as_secs()
                    ),
                ));
            }
        };
        drop(artifact);

        let stdout = decode_lossy(&output.stdout);
        let stderr = decode_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::warn!(endpoint, stderr = %stderr.trim(), "worker stderr");
        }

        // A worker that died is a process failure no matter what it
        // managed to print first; stdout is only trusted on clean exit.
        if !output.status.success() {
            let detail = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(ProviderError::Call {
                kind: ErrorKind::ProcessFailure,
                message: format!(
                    "worker exited with {} for {endpoint}: {}",
                    output.status,
                    snippet(detail)
                ),
                hints: vec![],
            });
        }

        // The envelope is the last non-empty stdout line; earlier lines
        // are library noise.
        let envelope = stdout.lines().rev().find(|l| !l.trim().is_empty());

        match envelope.and_then(|line| serde_json::from_str::<WorkerResponse>(line).ok()) {
            Some(response) => response.into_payload(),
            None => Err(ProviderError::Call {
                kind: ErrorKind::ProcessFailure,
                message: format!(
                    "worker produced no parsable response for {endpoint}: {}",
                    snippet(&stdout)
                ),
                hints: vec![],
            }),
        }
    }
}

/// Write the parameter map to a temp file, falling back to an inline
/// JSON argument when the filesystem refuses.
fn prepare_params(params: &Map<String, Value>) -> Result<ParamArtifact, ProviderError> {
    let json = serde_json::to_string(params)
        .map_err(|e| ProviderError::InvalidData(format!("unserializable parameters: {e}")))?;

    match tempfile::NamedTempFile::new() {
        Ok(mut file) => match file.write_all(json.as_bytes()).and_then(|_| file.flush()) {
            Ok(()) => Ok(ParamArtifact::File(file)),
            Err(e) => {
                tracing::warn!(error = %e, "temp file write failed, passing params inline");
                Ok(ParamArtifact::Inline(json))
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "temp file creation failed, passing params inline");
            Ok(ParamArtifact::Inline(json))
        }
    }
}

/// Worker output is UTF-8 in the common case, GBK from older locales,
/// and as a last resort treated as Latin-1 so nothing is dropped.
fn decode_lossy(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    let (decoded, _, had_errors) = encoding_rs::GBK.decode(bytes);
    if !had_errors {
        return decoded.into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn snippet(text: &str) -> &str {
    let trimmed = text.trim();
    let end = trimmed
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// A worker stand-in: a shell script that ignores its arguments and
    /// emits whatever the test wants on stdout.
    fn script_worker(dir: &tempfile::TempDir, body: &str) -> WorkerCommand {
        let path: PathBuf = dir.path().join("worker.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        WorkerCommand::new(path.to_string_lossy().into_owned())
    }

    fn no_params() -> Map<String, Value> {
        Map::new()
    }

    #[tokio::test]
    async fn test_success_envelope_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let worker = script_worker(
            &dir,
            r#"echo '{"success":true,"type":"table","columns":["收盘"],"data":[[10.5]]}'"#,
        );
        let gateway = WorkerGateway::new(worker);
        let payload = gateway
            .invoke_once("stock_zh_a_hist", &no_params(), Duration::from_secs(10))
            .await
            .unwrap();
        let table = payload.into_table().unwrap();
        assert_eq!(table.numeric(0, "收盘"), Some(10.5));
    }

    #[tokio::test]
    async fn test_noise_before_envelope_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let worker = script_worker(
            &dir,
            concat!(
                "echo 'FutureWarning: something deprecated'\n",
                r#"echo '{"success":true,"type":"scalar","data":"ok"}'"#
            ),
        );
        let gateway = WorkerGateway::new(worker);
        let payload = gateway
            .invoke_once("stock_bid_ask_em", &no_params(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(payload, FetchPayload::Scalar("ok".to_string()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let worker = script_worker(&dir, "echo 'boom' >&2\nexit 3");
        let gateway = WorkerGateway::new(worker);
        let err = gateway
            .invoke_once("stock_zh_a_hist", &no_params(), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessFailure);
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_success_envelope_with_nonzero_exit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let worker = script_worker(
            &dir,
            concat!(
                r#"echo '{"success":true,"type":"scalar","data":"ok"}'"#,
                "\nexit 3"
            ),
        );
        let gateway = WorkerGateway::new(worker);
        let err = gateway
            .invoke_once("stock_zh_a_hist", &no_params(), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessFailure);
    }

    #[tokio::test]
    async fn test_garbage_stdout_is_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let worker = script_worker(&dir, "echo 'this is not json'");
        let gateway = WorkerGateway::new(worker);
        let err = gateway
            .invoke_once("stock_zh_a_hist", &no_params(), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessFailure);
    }

    #[tokio::test]
    async fn test_budget_expiry_kills_worker() {
        let dir = tempfile::tempdir().unwrap();
        let worker = script_worker(&dir, "sleep 5\necho '{\"success\":true}'");
        let gateway = WorkerGateway::new(worker);
        let started = std::time::Instant::now();
        let err = gateway
            .invoke_once("stock_zh_a_hist", &no_params(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_params_arrive_via_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // $1 is the endpoint, $2 the parameter artifact path
        let worker = script_worker(
            &dir,
            concat!(
                r#"if grep -q 600519 "$2"; then"#,
                "\n",
                r#"  echo '{"success":true,"type":"scalar","data":"seen"}'"#,
                "\n",
                "else\n",
                r#"  echo '{"success":false,"error":"params missing"}'"#,
                "\nfi"
            ),
        );
        let gateway = WorkerGateway::new(worker);
        let mut params = Map::new();
        params.insert("symbol".to_string(), Value::String("600519".to_string()));
        let payload = gateway
            .invoke_once("stock_bid_ask_em", &params, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(payload, FetchPayload::Scalar("seen".to_string()));
    }

    #[test]
    fn test_decode_prefers_utf8_then_gbk() {
        assert_eq!(decode_lossy("收盘".as_bytes()), "收盘");
        // "中文" in GBK
        let gbk = [0xD6, 0xD0, 0xCE, 0xC4];
        assert_eq!(decode_lossy(&gbk), "中文");
    }
}
