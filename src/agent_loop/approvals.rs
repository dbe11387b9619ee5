//! Approval types for gated tool calls.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

/// Reason recorded when a rejection does not carry one.
pub const DEFAULT_REJECTION_REASON: &str = "rejected by approver";

/// A gated tool call waiting for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    /// Agent whose turn requested the call.
    pub agent: String,
    /// Snapshot of the shared context when the request was raised.
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Answer to an [`ApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Leave the call pending; the run suspends.
    Defer,
}

impl ApprovalDecision {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: Some(reason.into()),
        }
    }
}

/// Async approval handler callback.
pub type ApprovalHandler =
    Arc<dyn Fn(ApprovalRequest) -> BoxFuture<'static, ApprovalDecision> + Send + Sync>;

/// Wrap an async closure as an [`ApprovalHandler`].
pub fn approval_handler<F, Fut>(f: F) -> ApprovalHandler
where
    F: Fn(ApprovalRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApprovalDecision> + Send + 'static,
{
    Arc::new(move |request| f(request).boxed())
}

/// Where a gated call stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected { reason: String },
}

impl ApprovalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<ApprovalDecision> for ApprovalStatus {
    fn from(decision: ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Approve => Self::Approved,
            ApprovalDecision::Reject { reason } => Self::Rejected {
                reason: reason.unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            },
            ApprovalDecision::Defer => Self::Pending,
        }
    }
}

/// A gated call recorded in a suspended [`RunState`](super::RunState).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub status: ApprovalStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejection_without_reason_gets_default() {
        let status = ApprovalStatus::from(ApprovalDecision::Reject { reason: None });
        assert_eq!(
            status,
            ApprovalStatus::Rejected {
                reason: DEFAULT_REJECTION_REASON.to_string()
            }
        );
        assert!(ApprovalStatus::from(ApprovalDecision::Defer).is_pending());
    }

    #[test]
    fn decisions_use_tagged_json() {
        let json = serde_json::to_value(ApprovalDecision::reject("too risky")).unwrap();
        assert_eq!(json, json!({ "decision": "reject", "reason": "too risky" }));
        let back: ApprovalDecision = serde_json::from_value(json!({ "decision": "approve" })).unwrap();
        assert_eq!(back, ApprovalDecision::Approve);
    }

    #[tokio::test]
    async fn closure_handler_is_callable() {
        let handler = approval_handler(|request: ApprovalRequest| async move {
            if request.tool_name == "delete" {
                ApprovalDecision::reject("no deletes")
            } else {
                ApprovalDecision::Approve
            }
        });
        let request = ApprovalRequest {
            call_id: "c1".into(),
            tool_name: "delete".into(),
            arguments: json!({}),
            agent: "ops".into(),
            context: json!(null),
        };
        assert_eq!(handler(request).await, ApprovalDecision::reject("no deletes"));
    }
}
