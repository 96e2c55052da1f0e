//! Terminal artifact of a research run

use crate::agents::{ReportData, VerificationResult};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchOutput {
    pub report: ReportData,
    pub verification: VerificationResult,
}

impl fmt::Display for ResearchOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n\n=====REPORT=====\n\n")?;
        writeln!(f, "Report:\n{}", self.report.markdown_report)?;
        writeln!(f, "\n\n=====FOLLOW UP QUESTIONS=====\n\n")?;
        writeln!(f, "{}", self.report.follow_up_questions.join("\n"))?;
        writeln!(f, "\n\n=====VERIFICATION=====\n\n")?;
        write!(f, "{}", self.verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_rendered_in_order() {
        let output = ResearchOutput {
            report: ReportData {
                short_summary: "Strong quarter".to_string(),
                markdown_report: "# Apple Q3\nRevenue up".to_string(),
                follow_up_questions: vec!["Margins?".to_string(), "Guidance?".to_string()],
            },
            verification: VerificationResult {
                verified: true,
                issues: String::new(),
            },
        };

        let rendered = output.to_string();
        let report = rendered.find("=====REPORT=====").unwrap();
        let questions = rendered.find("=====FOLLOW UP QUESTIONS=====").unwrap();
        let verification = rendered.find("=====VERIFICATION=====").unwrap();

        assert!(report < questions && questions < verification);
        assert!(rendered.contains("Report:\n# Apple Q3\nRevenue up"));
        assert!(rendered.contains("Margins?\nGuidance?"));
        assert!(rendered.ends_with("verified=true issues=''"));
    }
}
