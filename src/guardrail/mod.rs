//! Policy checks on user input and final answers.
//!
//! Input guardrails see the raw user input once, before the first turn.
//! Output guardrails see each final answer. A failing guardrail either
//! trips the run ([`GuardrailPolicy::Block`]) or asks the model for another
//! answer with the violation as feedback ([`GuardrailPolicy::RetryWithFeedback`]).

pub mod builtin;
pub mod enforcer;

pub use builtin::{FnGuardrail, MaxLengthGuardrail, RegexGuardrail};
pub use enforcer::{enforce, GuardrailFailure, GuardrailVerdict};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::context::SharedContext;

/// Which text a guardrail inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GuardrailKind {
    Input,
    Output,
}

/// What happens when a guardrail fails.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GuardrailPolicy {
    /// Abort the run with a tripwire error.
    #[default]
    Block,
    /// Feed the violation back to the model and ask again.
    RetryWithFeedback,
}

/// Result of one guardrail check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GuardrailOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// A policy check over a piece of text.
#[async_trait]
pub trait Guardrail: Send + Sync {
    /// Name reported in tripwire errors and events.
    fn name(&self) -> &str;

    fn kind(&self) -> GuardrailKind;

    fn policy(&self) -> GuardrailPolicy {
        GuardrailPolicy::Block
    }

    async fn validate(&self, text: &str, ctx: &SharedContext) -> GuardrailOutcome;
}
