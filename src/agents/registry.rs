use std::sync::Arc;

use crate::agents::agent::{Agent, AgentDescriptor};
use crate::agents::{
    analytics, document_analyzer, document_parser, report_generator, sentiment, text_extractor,
};
use crate::error::{Result, ShowcaseError};

/// Every agent this crate can run, in pipeline order.
pub const AGENT_NAMES: &[&str] = &[
    document_parser::NAME,
    text_extractor::NAME,
    analytics::NAME,
    sentiment::NAME,
    report_generator::NAME,
    document_analyzer::NAME,
];

pub struct AgentRegistry;

impl AgentRegistry {
    pub fn names() -> &'static [&'static str] {
        AGENT_NAMES
    }

    pub fn build(name: &str) -> Result<Arc<dyn Agent>> {
        let agent: Arc<dyn Agent> = match name {
            document_parser::NAME => Arc::new(document_parser::DocumentParser::new()),
            text_extractor::NAME => Arc::new(text_extractor::TextExtractor::new()?),
            analytics::NAME => Arc::new(analytics::AnalyticsAgent::new()?),
            sentiment::NAME => Arc::new(sentiment::SentimentAnalyzer::new()?),
            report_generator::NAME => Arc::new(report_generator::ReportGenerator::new()),
            document_analyzer::NAME => Arc::new(document_analyzer::DocumentAnalyzer::new()?),
            other => {
                return Err(ShowcaseError::AgentError(format!(
                    "Unknown agent '{}', must be one of: {}",
                    other,
                    AGENT_NAMES.join(", ")
                ))
                .into())
            }
        };
        Ok(agent)
    }

    pub fn descriptors() -> Result<Vec<AgentDescriptor>> {
        AGENT_NAMES
            .iter()
            .map(|name| Self::build(name).map(|agent| agent.descriptor()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_builds_matching_agent() {
        for name in AgentRegistry::names() {
            let agent = AgentRegistry::build(name).unwrap();
            assert_eq!(agent.name(), *name);
            assert_eq!(agent.descriptor().agent_version, "1.0.0");
            assert!(!agent.descriptor().capabilities.is_empty());
        }
    }

    #[test]
    fn test_unknown_agent_is_rejected() {
        let err = AgentRegistry::build("ocr_agent").err().unwrap();
        assert!(err.to_string().contains("Unknown agent 'ocr_agent'"));
    }

    #[test]
    fn test_descriptors_cover_all_agents() {
        assert_eq!(AgentRegistry::descriptors().unwrap().len(), 6);
    }
}
