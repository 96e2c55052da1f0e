//! The six agents used by a research run

use super::schemas::{AnalysisSummary, ReportData, SearchPlan, VerificationResult};
use super::{Agent, OutputType};
use crate::config::AgentModels;
use crate::tools::Tool;
use std::sync::Arc;

pub const PLANNER_AGENT: &str = "FinancialPlannerAgent";
pub const SEARCH_AGENT: &str = "FinancialSearchAgent";
pub const WRITER_AGENT: &str = "FinancialWriterAgent";
pub const VERIFIER_AGENT: &str = "VerificationAgent";
pub const FUNDAMENTALS_AGENT: &str = "FundamentalsAnalystAgent";
pub const RISK_AGENT: &str = "RiskAnalystAgent";

const PLANNER_INSTRUCTIONS: &str = "You are a financial research planner. Given a request for \
financial analysis, produce a set of web searches to gather the context needed. Aim for recent \
headlines, earnings calls or 10-K snippets, analyst commentary, and industry background. \
Output between 5 and 15 search terms to query for.";

const SEARCH_INSTRUCTIONS: &str = "You are a research assistant specializing in financial \
topics. Given a search term, use web search to retrieve up-to-date context and produce a short \
summary of at most 300 words. Focus on key numbers, events, or quotes that will be useful to a \
financial analyst.";

const FUNDAMENTALS_INSTRUCTIONS: &str = "You are a financial analyst focused on company \
fundamentals such as revenue, profit, margins and growth trajectory. Given a collection of web \
(and optional file) search results about a company, write a concise analysis of its recent \
financial performance. Pull out key metrics or quotes. Keep it under 2 paragraphs.";

const RISK_INSTRUCTIONS: &str = "You are a risk analyst looking for potential red flags in a \
company's outlook. Given background research, produce a short analysis of risks such as \
competitive threats, regulatory issues, supply chain problems, or slowing growth. Keep it under \
2 paragraphs.";

const WRITER_INSTRUCTIONS: &str = "You are a senior financial analyst. You will be provided \
with the original query and a set of raw search summaries. Your task is to synthesize these \
into a long-form markdown report (at least several paragraphs) including a short executive \
summary and follow-up questions. If needed, you can call the available analysis tools \
(e.g. fundamentals_analysis, risk_analysis) to get short specialist write-ups to incorporate.";

const VERIFIER_INSTRUCTIONS: &str = "You are a meticulous auditor. You have been handed a \
financial analysis report. Your job is to verify the report is internally consistent, clearly \
sourced, and makes no unsupported claims. Point out any issues or uncertainties.";

/// Agent set for one research run
#[derive(Debug, Clone)]
pub struct ResearchAgents {
    pub planner: Agent,
    pub search: Agent,
    pub writer: Agent,
    pub verifier: Agent,
    pub financials: Agent,
    pub risk: Agent,
}

impl ResearchAgents {
    pub fn from_models(models: &AgentModels) -> Self {
        Self {
            planner: Agent::new(PLANNER_AGENT, PLANNER_INSTRUCTIONS, &models.planner)
                .with_output(OutputType::structured::<SearchPlan>()),
            search: Agent::new(SEARCH_AGENT, SEARCH_INSTRUCTIONS, &models.search),
            writer: Agent::new(WRITER_AGENT, WRITER_INSTRUCTIONS, &models.writer)
                .with_output(OutputType::structured::<ReportData>()),
            verifier: Agent::new(VERIFIER_AGENT, VERIFIER_INSTRUCTIONS, &models.verifier)
                .with_output(OutputType::structured::<VerificationResult>()),
            financials: Agent::new(
                FUNDAMENTALS_AGENT,
                FUNDAMENTALS_INSTRUCTIONS,
                &models.financials,
            )
            .with_output(OutputType::structured::<AnalysisSummary>()),
            risk: Agent::new(RISK_AGENT, RISK_INSTRUCTIONS, &models.risk)
                .with_output(OutputType::structured::<AnalysisSummary>()),
        }
    }
}

impl ResearchAgents {
    /// Give the search agent its lookup tools (normally `web_search`)
    pub fn with_search_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.search = self.search.with_tools(tools);
        self
    }
}

impl Default for ResearchAgents {
    fn default() -> Self {
        Self::from_models(&AgentModels::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_come_from_config() {
        let models = AgentModels {
            planner: "o3-mini".to_string(),
            ..Default::default()
        };
        let agents = ResearchAgents::from_models(&models);

        assert_eq!(agents.planner.model, "o3-mini");
        assert_eq!(agents.writer.model, "gpt-4.1");
        assert_eq!(agents.verifier.model, "gpt-4o");
    }

    #[test]
    fn test_output_shapes() {
        let agents = ResearchAgents::default();

        assert!(agents.planner.output.is_structured());
        assert!(!agents.search.output.is_structured());
        assert!(agents.writer.output.is_structured());
        assert!(agents.verifier.output.is_structured());
        assert!(agents.financials.output.is_structured());
        assert!(agents.risk.output.is_structured());
    }

    #[test]
    fn test_no_agent_starts_with_tools() {
        let agents = ResearchAgents::default();
        assert!(agents.writer.tools.is_empty());
        assert!(agents.search.tools.is_empty());
        assert_eq!(agents.writer.name, WRITER_AGENT);
    }

    #[test]
    fn test_search_tools_attach_to_search_agent_only() {
        let tool = crate::tools::WebSearchTool::new(crate::tools::WebSearchConfig {
            api_key: "key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let tool: Arc<dyn Tool> = Arc::new(tool);
        let agents = ResearchAgents::default().with_search_tools(vec![tool]);

        assert_eq!(agents.search.tool_names(), vec!["web_search".to_string()]);
        assert!(agents.writer.tools.is_empty());
        assert!(agents.planner.tools.is_empty());
    }
}
