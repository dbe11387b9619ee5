//! Token and turn accounting across a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::usage::Usage;

/// Usage attributed to one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUsage {
    pub usage: Usage,
    /// Model invocations made while this agent was active.
    pub turns: u32,
}

/// Running totals for a run, split by agent.
///
/// Stored inside [`RunState`](crate::agent_loop::RunState) so counts survive
/// suspension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAggregator {
    total: Usage,
    per_agent: BTreeMap<String, AgentUsage>,
    invocations: u32,
}

impl UsageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one model invocation by `agent`.
    pub fn record(&mut self, agent: &str, usage: &Usage) {
        self.total.merge(usage);
        let entry = self.per_agent.entry(agent.to_string()).or_default();
        entry.usage.merge(usage);
        entry.turns += 1;
        self.invocations += 1;
    }

    pub fn total(&self) -> &Usage {
        &self.total
    }

    pub fn agent(&self, name: &str) -> Option<&AgentUsage> {
        self.per_agent.get(name)
    }

    pub fn per_agent(&self) -> &BTreeMap<String, AgentUsage> {
        &self.per_agent
    }

    pub fn turns_for(&self, name: &str) -> u32 {
        self.agent(name).map(|a| a.turns).unwrap_or(0)
    }

    /// Model invocations across all agents.
    pub fn invocations(&self) -> u32 {
        self.invocations
    }
}
