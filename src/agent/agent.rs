//! Agent definition: instructions, tools, transfer targets, guardrails, model settings.

use std::sync::Arc;

use crate::guardrail::Guardrail;
use crate::provider::ToolDefinition;
use crate::tools::{Tool, ToolRegistry};
use crate::transfer::Transfer;
use crate::types::ModelSettings;

/// A named configuration the run loop drives.
///
/// Agents do not own each other. Transfer targets are names resolved through
/// an [`AgentRegistry`](super::AgentRegistry), so cyclic graphs are fine.
#[derive(Clone)]
pub struct Agent {
    pub name: String,
    /// Short summary used in transfer tool descriptions.
    pub description: Option<String>,
    /// System prompt text.
    pub instructions: String,
    pub tools: ToolRegistry,
    pub transfers: Vec<Transfer>,
    pub guardrails: Vec<Arc<dyn Guardrail>>,
    pub settings: ModelSettings,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instructions: String::new(),
            tools: ToolRegistry::new(),
            transfers: Vec::new(),
            guardrails: Vec::new(),
            settings: ModelSettings::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Add a tool.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.register(Arc::new(tool));
        self
    }

    /// Add an already shared tool.
    pub fn with_shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_transfer(mut self, transfer: Transfer) -> Self {
        self.add_transfer(transfer);
        self
    }

    pub fn with_guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.guardrails.push(Arc::new(guardrail));
        self
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Shorthand for setting only the model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.settings.model = Some(model.into());
        self
    }

    /// Add or replace the transfer to `transfer.target`.
    pub fn add_transfer(&mut self, transfer: Transfer) {
        match self.transfers.iter_mut().find(|t| t.target == transfer.target) {
            Some(existing) => *existing = transfer,
            None => self.transfers.push(transfer),
        }
    }

    /// Regular tool schemas followed by one synthetic tool per transfer target.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self.tools.definitions();
        definitions.extend(self.transfers.iter().map(Transfer::definition));
        definitions
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field(
                "transfers",
                &self.transfers.iter().map(|t| t.target.as_str()).collect::<Vec<_>>(),
            )
            .field("guardrails", &self.guardrails.len())
            .field("settings", &self.settings)
            .finish()
    }
}
