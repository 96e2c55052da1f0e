//! Structured outputs exchanged between pipeline stages
//!
//! Every type here is strict: a missing field fails deserialization instead of
//! falling back to a default. Field docs end up in the JSON schema the model sees.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One web search to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchItem {
    /// Why this search is relevant to the query
    pub reason: String,
    /// The search term to feed into a web search
    pub query: String,
}

/// Output of the planner agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchPlan {
    /// Searches to perform; may be empty
    pub searches: Vec<SearchItem>,
}

/// Output of the writer agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportData {
    /// A short 2-3 sentence executive summary
    pub short_summary: String,
    /// The full markdown report
    pub markdown_report: String,
    /// Suggested follow-up questions for further research
    pub follow_up_questions: Vec<String>,
}

/// Output of the verification agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VerificationResult {
    /// Whether the report seems coherent and plausible
    pub verified: bool,
    /// If not verified, describe the main issues or concerns
    pub issues: String,
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "verified={} issues='{}'", self.verified, self.issues)
    }
}

/// Output of the fundamentals and risk analysts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSummary {
    /// Short text summary for this aspect of the analysis
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_missing_field_rejected() {
        let result: Result<ReportData, _> = serde_json::from_value(json!({
            "short_summary": "Revenue grew",
            "markdown_report": "# Apple"
        }));

        let err = result.unwrap_err().to_string();
        assert!(err.contains("follow_up_questions"));
    }

    #[test]
    fn test_plan_parses_empty_searches() {
        let plan: SearchPlan = serde_json::from_value(json!({"searches": []})).unwrap();
        assert!(plan.searches.is_empty());
    }

    #[test]
    fn test_search_item_requires_reason() {
        let result: Result<SearchItem, _> = serde_json::from_value(json!({"query": "AAPL"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_verification_display() {
        let verification = VerificationResult {
            verified: false,
            issues: "Revenue figure unsupported".to_string(),
        };
        assert_eq!(
            verification.to_string(),
            "verified=false issues='Revenue figure unsupported'"
        );
    }
}
