//! Subprocess completion adapter.
//!
//! Runs a configured program (for example `llm --model gpt-4o-mini`), writes
//! the prompt to its stdin and returns its stdout.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Completion, CompletionRequest, GeneratorConfig};

/// Longest stderr excerpt quoted in an error.
const STDERR_EXCERPT: usize = 400;

/// [`Completion`] backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    name: String,
    program: String,
    args: Vec<String>,
    model_flag: String,
    timeout: Duration,
}

impl CommandCompletion {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            name: format!("command:{program}"),
            program,
            args: Vec::new(),
            model_flag: "--model".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(&config.command)
            .with_args(config.args.clone())
            .with_model_flag(&config.model_flag)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_model_flag(mut self, flag: impl Into<String>) -> Self {
        self.model_flag = flag.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, model: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if !model.is_empty() && !self.model_flag.is_empty() {
            cmd.arg(&self.model_flag).arg(model);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Completion for CommandCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut child = self.command(&request.model).spawn().with_context(|| {
            format!(
                "failed to spawn generator '{}' -- is it installed and on PATH?",
                self.program
            )
        })?;

        let stdin = child.stdin.take();
        let prompt = request.prompt.as_bytes();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(prompt).await {
                    // The program may exit without reading all of its input.
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                        return Err(e).context("failed to write prompt to generator stdin");
                    }
                    _ => {}
                }
                // Dropping stdin closes it so the program sees EOF.
            }
            Ok::<(), anyhow::Error>(())
        };

        // The prompt is fed while stdout drains, so a program that echoes
        // before reading everything cannot stall on a full pipe.
        let exchange = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output.with_context(|| format!("failed to wait for generator '{}'", self.program))
        };

        // On timeout the child is dropped and killed.
        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "generator '{}' timed out after {}s",
                    self.program,
                    self.timeout.as_secs_f64()
                )
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            bail!(
                "generator '{}' exited with {}: {}",
                self.program,
                output.status,
                excerpt
            );
        }

        let text = String::from_utf8(output.stdout).context("generator output is not UTF-8")?;
        debug!(generator = %self.name, bytes = text.len(), "completion received");
        Ok(text)
    }
}
