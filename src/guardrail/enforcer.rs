//! Runs every guardrail of one kind and folds the results into a verdict.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::{Guardrail, GuardrailKind, GuardrailPolicy};
use crate::context::SharedContext;
use crate::error::BatonError;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailFailure {
    pub guardrail: String,
    pub kind: GuardrailKind,
    pub policy: GuardrailPolicy,
    pub message: String,
}

impl GuardrailFailure {
    pub fn into_error(self) -> BatonError {
        BatonError::GuardrailTripwire {
            guardrail: self.guardrail,
            message: self.message,
        }
    }
}

/// Combined outcome of all guardrails of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Passed,
    /// Only retry-with-feedback guardrails failed.
    Retry {
        feedback: String,
        failures: Vec<GuardrailFailure>,
    },
    /// At least one blocking guardrail failed; carries the first one.
    Tripwire(GuardrailFailure),
}

impl GuardrailVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Run every guardrail of `kind` against `text` concurrently.
///
/// Guardrails are independent: any single failure is enough to trigger its
/// policy, and a blocking failure outranks retry failures.
pub async fn enforce(
    guardrails: &[Arc<dyn Guardrail>],
    kind: GuardrailKind,
    text: &str,
    ctx: &SharedContext,
) -> GuardrailVerdict {
    let selected: Vec<&Arc<dyn Guardrail>> =
        guardrails.iter().filter(|g| g.kind() == kind).collect();
    if selected.is_empty() {
        return GuardrailVerdict::Passed;
    }

    let outcomes = join_all(selected.iter().map(|g| g.validate(text, ctx))).await;

    let failures: Vec<GuardrailFailure> = selected
        .iter()
        .zip(outcomes)
        .filter(|(_, outcome)| !outcome.passed)
        .map(|(guardrail, outcome)| GuardrailFailure {
            guardrail: guardrail.name().to_string(),
            kind,
            policy: guardrail.policy(),
            message: outcome
                .message
                .unwrap_or_else(|| format!("{} guardrail failed", guardrail.name())),
        })
        .collect();

    if failures.is_empty() {
        return GuardrailVerdict::Passed;
    }

    for failure in &failures {
        tracing::debug!(
            guardrail = %failure.guardrail,
            kind = %failure.kind,
            policy = %failure.policy,
            message = %failure.message,
            "guardrail failed"
        );
    }

    if let Some(blocking) = failures
        .iter()
        .find(|f| f.policy == GuardrailPolicy::Block)
    {
        return GuardrailVerdict::Tripwire(blocking.clone());
    }

    let feedback = failures
        .iter()
        .map(|f| format!("Guardrail '{}' rejected the {} text: {}", f.guardrail, f.kind, f.message))
        .collect::<Vec<_>>()
        .join("\n");
    GuardrailVerdict::Retry { feedback, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::{FnGuardrail, GuardrailOutcome, MaxLengthGuardrail};

    fn guardrails() -> Vec<Arc<dyn Guardrail>> {
        vec![
            Arc::new(
                FnGuardrail::new("polite", GuardrailKind::Output, |text, _| {
                    if text.contains("please") {
                        GuardrailOutcome::pass()
                    } else {
                        GuardrailOutcome::fail("say please")
                    }
                })
                .with_policy(GuardrailPolicy::RetryWithFeedback),
            ),
            Arc::new(MaxLengthGuardrail::new(10)),
            Arc::new(FnGuardrail::new("input_only", GuardrailKind::Input, |_, _| {
                GuardrailOutcome::fail("never runs on output")
            })),
        ]
    }

    #[tokio::test]
    async fn all_pass() {
        let verdict = enforce(&guardrails(), GuardrailKind::Output, "please", &SharedContext::default()).await;
        assert!(verdict.is_passed());
    }

    #[tokio::test]
    async fn block_outranks_retry() {
        let verdict = enforce(
            &guardrails(),
            GuardrailKind::Output,
            "a very long answer without manners",
            &SharedContext::default(),
        )
        .await;
        match verdict {
            GuardrailVerdict::Tripwire(failure) => assert_eq!(failure.guardrail, "max_length"),
            other => panic!("expected tripwire, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_only_failures_produce_feedback() {
        let verdict = enforce(&guardrails(), GuardrailKind::Output, "short", &SharedContext::default()).await;
        match verdict {
            GuardrailVerdict::Retry { feedback, failures } => {
                assert_eq!(failures.len(), 1);
                assert!(feedback.contains("say please"));
                assert!(feedback.contains("'polite'"));
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn kind_filter_applies() {
        let verdict = enforce(&guardrails(), GuardrailKind::Input, "anything", &SharedContext::default()).await;
        assert!(matches!(verdict, GuardrailVerdict::Tripwire(ref f) if f.guardrail == "input_only"));
    }
}
