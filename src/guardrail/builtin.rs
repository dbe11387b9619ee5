//! Ready-made guardrails.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{Guardrail, GuardrailKind, GuardrailOutcome, GuardrailPolicy};
use crate::context::SharedContext;
use crate::error::{BatonError, Result};

/// Fails when the text is longer than `max_chars` characters.
#[derive(Debug, Clone)]
pub struct MaxLengthGuardrail {
    name: String,
    max_chars: usize,
    kind: GuardrailKind,
    policy: GuardrailPolicy,
}

impl MaxLengthGuardrail {
    /// An output guardrail named `max_length` that blocks.
    pub fn new(max_chars: usize) -> Self {
        Self {
            name: "max_length".to_string(),
            max_chars,
            kind: GuardrailKind::Output,
            policy: GuardrailPolicy::Block,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn on(mut self, kind: GuardrailKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_policy(mut self, policy: GuardrailPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Guardrail for MaxLengthGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    fn policy(&self) -> GuardrailPolicy {
        self.policy
    }

    async fn validate(&self, text: &str, _ctx: &SharedContext) -> GuardrailOutcome {
        let len = text.chars().count();
        if len <= self.max_chars {
            GuardrailOutcome::pass()
        } else {
            GuardrailOutcome::fail(format!(
                "text is {len} characters; the limit is {}",
                self.max_chars
            ))
        }
    }
}

/// Fails when the text matches a forbidden pattern.
#[derive(Debug, Clone)]
pub struct RegexGuardrail {
    name: String,
    pattern: Regex,
    kind: GuardrailKind,
    policy: GuardrailPolicy,
    message: Option<String>,
}

impl RegexGuardrail {
    pub fn deny(name: impl Into<String>, pattern: &str, kind: GuardrailKind) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| BatonError::Configuration(format!("invalid guardrail pattern: {e}")))?;
        Ok(Self {
            name: name.into(),
            pattern,
            kind,
            policy: GuardrailPolicy::Block,
            message: None,
        })
    }

    pub fn with_policy(mut self, policy: GuardrailPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Message reported instead of the default.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
impl Guardrail for RegexGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    fn policy(&self) -> GuardrailPolicy {
        self.policy
    }

    async fn validate(&self, text: &str, _ctx: &SharedContext) -> GuardrailOutcome {
        match self.pattern.find(text) {
            None => GuardrailOutcome::pass(),
            Some(found) => GuardrailOutcome::fail(self.message.clone().unwrap_or_else(|| {
                format!("text contains forbidden content '{}'", found.as_str())
            })),
        }
    }
}

type CheckFn = dyn Fn(&str, &SharedContext) -> GuardrailOutcome + Send + Sync;

/// Guardrail backed by a synchronous closure.
#[derive(Clone)]
pub struct FnGuardrail {
    name: String,
    kind: GuardrailKind,
    policy: GuardrailPolicy,
    check: Arc<CheckFn>,
}

impl FnGuardrail {
    pub fn new<F>(name: impl Into<String>, kind: GuardrailKind, check: F) -> Self
    where
        F: Fn(&str, &SharedContext) -> GuardrailOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            policy: GuardrailPolicy::Block,
            check: Arc::new(check),
        }
    }

    pub fn with_policy(mut self, policy: GuardrailPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl std::fmt::Debug for FnGuardrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGuardrail")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl Guardrail for FnGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> GuardrailKind {
        self.kind
    }

    fn policy(&self) -> GuardrailPolicy {
        self.policy
    }

    async fn validate(&self, text: &str, ctx: &SharedContext) -> GuardrailOutcome {
        (self.check)(text, ctx)
    }
}
