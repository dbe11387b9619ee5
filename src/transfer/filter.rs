//! History rewrites applied when control moves to another agent.

use std::sync::Arc;

use crate::types::{ContentPart, ModelMessage, Role};

/// Custom history rewrite.
pub type FilterFn = Arc<dyn Fn(Vec<ModelMessage>) -> Vec<ModelMessage> + Send + Sync>;

/// Rewrites the history the receiving agent sees.
#[derive(Clone)]
pub enum InputFilter {
    /// Remove tool results and the tool calls that produced them.
    DropToolMessages,
    /// Keep only the most recent `n` messages. Tool results at the front of
    /// the kept window lost their calls and are dropped too.
    KeepLast(usize),
    Custom(FilterFn),
}

impl InputFilter {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Vec<ModelMessage>) -> Vec<ModelMessage> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Produce a new history; the input is left untouched.
    pub fn apply(&self, history: &[ModelMessage]) -> Vec<ModelMessage> {
        match self {
            Self::DropToolMessages => drop_tool_messages(history),
            Self::KeepLast(n) => {
                let mut start = history.len().saturating_sub(*n);
                while history.get(start).is_some_and(|m| m.role == Role::Tool) {
                    start += 1;
                }
                history[start..].to_vec()
            }
            Self::Custom(f) => f(history.to_vec()),
        }
    }
}

impl std::fmt::Debug for InputFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DropToolMessages => f.write_str("DropToolMessages"),
            Self::KeepLast(n) => write!(f, "KeepLast({n})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn drop_tool_messages(history: &[ModelMessage]) -> Vec<ModelMessage> {
    history
        .iter()
        .filter(|message| message.role != Role::Tool)
        .filter_map(|message| {
            if message.role != Role::Assistant || message.tool_calls().is_empty() {
                return Some(message.clone());
            }
            let mut stripped = message.clone();
            stripped
                .content
                .retain(|part| !matches!(part, ContentPart::ToolCall(_)));
            (!stripped.content.is_empty()).then_some(stripped)
        })
        .collect()
}
