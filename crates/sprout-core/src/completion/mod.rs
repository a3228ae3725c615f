//! The `Completion` trait -- the seam to the text-generation service.
//!
//! The service is a black box: one prompt in, one block of text out. The
//! pipeline never retries a completion; malformed text is handled
//! downstream or reported.

pub mod command;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use command::CommandCompletion;

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Model identifier passed to the service; empty means its default.
    pub model: String,
}

/// A text-generation backend.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Human-readable name for logs (e.g. "command:llm").
    fn name(&self) -> &str;

    /// Generate text for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Completion) {}
};

/// How to reach the generation service; the `[generator]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Program to run. Receives the prompt on stdin, answers on stdout.
    pub command: String,
    /// Extra arguments placed before the model flag.
    pub args: Vec<String>,
    /// Flag introducing the model id. Skipped when `model` is empty.
    pub model_flag: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: "llm".to_string(),
            args: Vec::new(),
            model_flag: "--model".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
        }
    }
}
