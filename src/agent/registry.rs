//! Arena of agents keyed by name.

use std::collections::BTreeMap;

use super::agent::Agent;
use crate::error::{BatonError, Result};
use crate::transfer::Transfer;

/// Every agent a run may activate.
///
/// Agents refer to each other by name, so `A -> B -> A` needs no shared
/// ownership: register both, then wire the back edge with
/// [`add_transfer`](Self::add_transfer).
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Agent) -> Result<()> {
        if self.agents.contains_key(&agent.name) {
            return Err(BatonError::DuplicateAgent(agent.name));
        }
        self.agents.insert(agent.name.clone(), agent);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, agent: Agent) -> Result<Self> {
        self.register(agent)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&Agent> {
        self.agents
            .get(name)
            .ok_or_else(|| BatonError::UnknownAgent(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Add a transfer edge to an already registered agent.
    pub fn add_transfer(&mut self, from: &str, transfer: Transfer) -> Result<()> {
        let agent = self
            .agents
            .get_mut(from)
            .ok_or_else(|| BatonError::UnknownAgent(from.to_string()))?;
        agent.add_transfer(transfer);
        Ok(())
    }

    /// Check that every transfer target is registered.
    pub fn validate(&self) -> Result<()> {
        for agent in self.agents.values() {
            if let Some(missing) = agent
                .transfers
                .iter()
                .find(|t| !self.agents.contains_key(&t.target))
            {
                return Err(BatonError::UnknownTransferTarget {
                    agent: agent.name.clone(),
                    target: missing.target.clone(),
                });
            }
        }
        Ok(())
    }
}
