use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::oracle::{Embedding, EmbeddingOracle, OracleError, OracleResult};

/// Exit code a model process uses to report a retryable failure (`EX_TEMPFAIL`).
pub const EXIT_TEMPFAIL: i32 = 75;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Oracle backed by an external model process, one process per call.
///
/// The request is written to stdin as JSON and the response read from stdout:
/// - `{"op":"embed","batch":[["tok",...],...]}` -> `{"embeddings":[[f32,...],...]}`
/// - `{"op":"compare","a":[...],"b":[...]}` -> `{"scores":[f32,...]}`
///
/// A call that outlives the deadline is killed and reported as transient, as is
/// an exit with status 75. Any other failure is permanent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOracle {
    argv: Vec<String>,
    timeout: Option<Duration>,
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum OracleRequest<'a> {
    Embed { batch: &'a [Vec<String>] },
    Compare { a: &'a [Embedding], b: &'a [Embedding] },
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Embedding>,
}

#[derive(Deserialize)]
struct CompareResponse {
    scores: Vec<f32>,
}

impl CommandOracle {
    pub fn new(argv: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { argv, timeout }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn call<T: DeserializeOwned>(&self, request: &OracleRequest<'_>) -> OracleResult<T> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| OracleError::Backend("oracle command is empty".to_string()))?;
        let body = serde_json::to_vec(request)
            .map_err(|e| OracleError::Backend(format!("failed to encode oracle request: {e}")))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OracleError::Backend(format!("failed to spawn {program}: {e}")))?;

        // Feed stdin and drain stdout/stderr on their own threads so a large
        // request or response cannot deadlock against the pipe buffers.
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || match stdin {
            Some(mut pipe) => pipe.write_all(&body),
            None => Ok(()),
        });
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = self.wait(&mut child, program)?;
        let _ = writer.join();
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            let message = format!(
                "{program} exited with {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            );
            return Err(if status.code() == Some(EXIT_TEMPFAIL) {
                OracleError::Transient(message)
            } else {
                OracleError::Backend(message)
            });
        }

        serde_json::from_slice(&stdout)
            .map_err(|e| OracleError::Backend(format!("failed to parse {program} response: {e}")))
    }

    fn wait(&self, child: &mut std::process::Child, program: &str) -> OracleResult<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map_err(|e| OracleError::Backend(format!("failed to wait for {program}: {e}")));
        };

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(OracleError::Transient(format!(
                        "{program} timed out after {}s",
                        timeout.as_secs_f32()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(OracleError::Backend(format!("failed to wait for {program}: {e}")))
                }
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl EmbeddingOracle for CommandOracle {
    fn embed(&self, batch: &[Vec<String>]) -> OracleResult<Vec<Embedding>> {
        debug!(size = batch.len(), "embedding batch via command oracle");
        let response: EmbedResponse = self.call(&OracleRequest::Embed { batch })?;
        Ok(response.embeddings)
    }

    fn compare(&self, a: &[Embedding], b: &[Embedding]) -> OracleResult<Vec<f32>> {
        let response: CompareResponse = self.call(&OracleRequest::Compare { a, b })?;
        Ok(response.scores)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
