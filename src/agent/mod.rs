//! Agents and the registry the run loop resolves them from.

pub mod agent;
pub mod registry;

pub use agent::Agent;
pub use registry::AgentRegistry;
