use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::code_session::ExecutionResult;

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    output: Option<String>,
    error: Option<String>,
    runtime_ms: u64,
    memory_bytes: Option<u64>,
    exit_code: i32,
}

/// Client for the external code-execution sandbox. The sandbox itself is an
/// untrusted external collaborator; this service only ships requests to it.
/// With no backend configured it returns a deterministic placeholder result
/// so callers never hang.
#[derive(Clone)]
pub struct ExecutionClient {
    http: Client,
    backend_url: Option<String>,
    timeout_secs: u64,
}

impl ExecutionClient {
    pub fn new(backend_url: Option<String>, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs + 5))
            .build()
            .unwrap_or_default();
        Self {
            http,
            backend_url,
            timeout_secs,
        }
    }

    pub async fn execute(&self, code: &str, language: &str) -> Result<ExecutionResult> {
        let url = match &self.backend_url {
            Some(url) => url,
            None => return Ok(self.placeholder(code, language)),
        };

        let started = Instant::now();
        let request = self
            .http
            .post(url)
            .json(&ExecuteRequest { code, language })
            .send();

        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), request)
            .await
            .map_err(|_| Error::ExecutionTimeout(self.timeout_secs))?
            .map_err(|e| Error::Execution(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Execution(format!(
                "Execution backend returned {}",
                response.status()
            )));
        }

        let body: ExecuteResponse = response
            .json()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        tracing::debug!(
            language,
            elapsed_ms = started.elapsed().as_millis() as u64,
            exit_code = body.exit_code,
            "sandbox execution finished"
        );

        Ok(ExecutionResult {
            timestamp: Utc::now(),
            output: body.output,
            error: body.error,
            runtime_ms: body.runtime_ms,
            memory_bytes: body.memory_bytes,
            exit_code: body.exit_code,
        })
    }

    fn placeholder(&self, code: &str, language: &str) -> ExecutionResult {
        ExecutionResult {
            timestamp: Utc::now(),
            output: Some(format!(
                "[no execution backend configured] received {} bytes of {}",
                code.len(),
                language
            )),
            error: None,
            runtime_ms: 0,
            memory_bytes: None,
            exit_code: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_result_without_backend() {
        let client = ExecutionClient::new(None, 30);
        let result = client.execute("print(1)", "python").await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.runtime_ms, 0);
        let output = result.output.unwrap();
        assert!(output.contains("no execution backend configured"));
        assert!(output.contains("python"));
    }
}
