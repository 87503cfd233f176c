pub mod agent;
pub mod analytics;
pub mod document_analyzer;
pub mod document_parser;
pub mod registry;
pub mod report_generator;
pub mod sentiment;
pub mod session;
pub mod text_extractor;

#[cfg(test)]
mod tests;

pub use agent::{run_agent, Agent, AgentDescriptor, AgentStatus, SessionMetrics, AGENT_VERSION};
pub use registry::{AgentRegistry, AGENT_NAMES};
pub use session::{AgentSession, SessionSettings};
