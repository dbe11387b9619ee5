//! Conversation history persistence.
//!
//! Storage backends live outside this crate. The run loop only reads the
//! prior history when a run starts and appends the run's messages when it
//! completes.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ModelMessage;

/// History store for one conversation.
#[async_trait]
pub trait Session: Send + Sync {
    /// Messages from earlier runs, oldest first.
    async fn get_history(&self) -> Result<Vec<ModelMessage>>;

    /// Persist messages produced by a completed run.
    async fn append(&self, messages: &[ModelMessage]) -> Result<()>;
}

/// Process-local session, mostly useful in tests and short-lived programs.
#[derive(Debug, Clone, Default)]
pub struct InMemorySession {
    messages: Arc<RwLock<Vec<ModelMessage>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(messages: Vec<ModelMessage>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(messages)),
        }
    }

    pub fn len(&self) -> usize {
        self.messages
            .read()
            .map(|m| m.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut guard = self
            .messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clear();
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn get_history(&self) -> Result<Vec<ModelMessage>> {
        let guard = self
            .messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    async fn append(&self, messages: &[ModelMessage]) -> Result<()> {
        let mut guard = self
            .messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.extend_from_slice(messages);
        Ok(())
    }
}
