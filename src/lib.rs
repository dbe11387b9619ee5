//! baton: multi-agent run loop for tool-calling language models.
//!
//! A [`Runner`](agent_loop::Runner) drives a conversation through turns of a
//! pluggable [`ModelProvider`](provider::ModelProvider). Each turn either
//! ends the run with a final answer, executes a batch of tools concurrently,
//! or transfers control to another agent. Guardrails check the input and the
//! final answer, and tool calls that need approval suspend the run into a
//! serializable [`RunState`](agent_loop::RunState) that can be resumed later.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use baton::prelude::*;
//!
//! # async fn example(provider: Arc<dyn ModelProvider>) -> baton::error::Result<()> {
//! let add = FunctionTool::new(
//!     "add",
//!     "Add two numbers",
//!     ToolParameters::object()
//!         .number("a", "left operand", true)
//!         .number("b", "right operand", true)
//!         .build(),
//!     |args, _ctx| async move { Ok(serde_json::json!(args.get_f64("a")? + args.get_f64("b")?)) },
//! );
//! let agents = AgentRegistry::new().with(Agent::new("math").with_tool(add))?;
//! let runner = Runner::new(provider, agents);
//!
//! match runner.run("math", "What is 2+2?", RunOptions::default()).await {
//!     Ok(RunOutcome::Completed(result)) => println!("{}", result.output),
//!     Ok(RunOutcome::Suspended(state)) => println!("{} approvals pending", state.pending_approvals().len()),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod agent_loop;
pub mod config;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod toon;
pub mod transfer;
pub mod types;
pub mod util;
