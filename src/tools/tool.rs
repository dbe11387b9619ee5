//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use super::validation::validate_arguments;
use crate::context::SharedContext;
use crate::error::Result;

/// Context available during tool execution.
#[derive(Debug, Clone)]
pub struct ToolExecutionContext {
    /// Id of the call being executed.
    pub call_id: String,
    /// Tool name as requested by the model.
    pub tool_name: String,
    /// Agent whose turn requested the call.
    pub agent_name: String,
    /// The run's shared context.
    pub shared: SharedContext,
    /// Canceled when the run is canceled or times out.
    pub cancel: CancellationToken,
}

impl ToolExecutionContext {
    /// A standalone context, for calling a tool outside a run.
    pub fn detached(tool_name: impl Into<String>, shared: SharedContext) -> Self {
        Self {
            call_id: String::new(),
            tool_name: tool_name.into(),
            agent_name: String::new(),
            shared,
            cancel: CancellationToken::new(),
        }
    }
}

/// Core tool trait -- implement to create custom tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Whether this call must be approved before it runs.
    fn needs_approval(&self, _args: &ToolArguments, _ctx: &SharedContext) -> bool {
        false
    }

    /// Check arguments before [`execute`](Tool::execute) is called.
    fn validate(&self, args: &serde_json::Value) -> std::result::Result<(), String> {
        validate_arguments(args, &self.parameters().schema)
    }

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value>;
}

/// Predicate deciding whether a particular call needs approval.
pub type ApprovalPredicate = Arc<dyn Fn(&ToolArguments, &SharedContext) -> bool + Send + Sync>;

/// Approval gate attached to a [`FunctionTool`].
#[derive(Clone, Default)]
pub enum ApprovalRequirement {
    #[default]
    Never,
    Always,
    When(ApprovalPredicate),
}

impl ApprovalRequirement {
    pub fn evaluate(&self, args: &ToolArguments, ctx: &SharedContext) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::When(predicate) => predicate(args, ctx),
        }
    }
}

impl std::fmt::Debug for ApprovalRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Never => f.write_str("Never"),
            Self::Always => f.write_str("Always"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Type alias for the tool handler function.
type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
///
/// ```
/// use baton::tools::{FunctionTool, ToolParameters};
///
/// let add = FunctionTool::new(
///     "add",
///     "Add two numbers",
///     ToolParameters::object()
///         .number("a", "left operand", true)
///         .number("b", "right operand", true)
///         .build(),
///     |args, _ctx| async move {
///         Ok(serde_json::json!(args.get_f64("a")? + args.get_f64("b")?))
///     },
/// );
/// # let _ = add;
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    approval: ApprovalRequirement,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            approval: ApprovalRequirement::Never,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    pub fn with_approval(mut self, approval: ApprovalRequirement) -> Self {
        self.approval = approval;
        self
    }

    /// Every call needs approval.
    pub fn requires_approval(self) -> Self {
        self.with_approval(ApprovalRequirement::Always)
    }

    /// Calls matching `predicate` need approval.
    pub fn requires_approval_when<P>(self, predicate: P) -> Self
    where
        P: Fn(&ToolArguments, &SharedContext) -> bool + Send + Sync + 'static,
    {
        self.with_approval(ApprovalRequirement::When(Arc::new(predicate)))
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn needs_approval(&self, args: &ToolArguments, ctx: &SharedContext) -> bool {
        self.approval.evaluate(args, ctx)
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("approval", &self.approval)
            .finish()
    }
}
