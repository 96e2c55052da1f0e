//! Research run orchestration
//!
//! Stage failures in Plan, Synthesize and Verify abort the run. Search failures
//! are isolated per task: each one becomes a [`SearchOutcome::Failed`] that the
//! fan-in counts and otherwise ignores.

use super::output::ResearchOutput;
use super::state::RunState;
use super::ticker::{ProgressTicker, WRITING_UPDATES};
use crate::agents::{
    Agent, AnalysisSummary, ReportData, ResearchAgents, SearchItem, SearchPlan,
    VerificationResult,
};
use crate::error::{ResearchError, ResearchResult, Stage};
use crate::observability::{metrics, PipelineMetrics};
use crate::observability::{SpanHandle, SpanId, SpanStatus, Tracer};
use crate::progress::Progress;
use crate::runner::{ExecutorError, RunOutput, TaskExecutor};
use crate::tools::{AgentTool, Tool, ToolError};
use crate::{run_span, stage_span};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

pub const RUN_SPAN: &str = "financial_research.run";
pub const PLAN_SPAN: &str = "financial_research.plan_searches";
pub const PERFORM_SEARCHES_SPAN: &str = "financial_research.perform_searches";
pub const SEARCH_SPAN: &str = "financial_research.search";
pub const WRITE_REPORT_SPAN: &str = "financial_research.write_report";
pub const VERIFY_REPORT_SPAN: &str = "financial_research.verify_report";

pub const FUNDAMENTALS_TOOL: &str = "fundamentals_analysis";
pub const FUNDAMENTALS_TOOL_DESCRIPTION: &str =
    "Use to get a short write-up of key financial metrics";
pub const RISK_TOOL: &str = "risk_analysis";
pub const RISK_TOOL_DESCRIPTION: &str = "Use to get a short write-up of potential red flags";

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one search task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Text(String),
    Failed,
}

impl SearchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SearchOutcome::Failed)
    }
}

/// The query of the active run and the span its stages hang off
#[derive(Debug, Clone)]
pub struct RunContext {
    pub query: String,
    pub run_span: SpanId,
}

/// Drives one research run
///
/// `run` consumes the manager, so each instance handles exactly one query.
pub struct ResearchManager {
    executor: Arc<dyn TaskExecutor>,
    agents: ResearchAgents,
    progress: Arc<dyn Progress>,
    tracer: Arc<dyn Tracer>,
    metrics: Arc<PipelineMetrics>,
    progress_interval: Duration,
    state: RunState,
    context: Option<RunContext>,
}

impl ResearchManager {
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        agents: ResearchAgents,
        progress: Arc<dyn Progress>,
        tracer: Arc<dyn Tracer>,
    ) -> Self {
        Self {
            executor,
            agents,
            progress,
            tracer,
            metrics: metrics(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            state: RunState::Start,
            context: None,
        }
    }

    /// Minimum gap between cosmetic updates while the report streams
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Report counters into `metrics` instead of the process-wide collector
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run every stage for `query` and return the verified report
    pub async fn run(mut self, query: &str) -> ResearchResult<ResearchOutput> {
        if query.trim().is_empty() {
            return Err(ResearchError::invalid_input("query must not be empty"));
        }

        let started = std::time::Instant::now();
        self.metrics.run_started();

        let span = self.tracer.start_span(RUN_SPAN, None);
        span.set_attribute("query", query.into());
        self.context = Some(RunContext {
            query: query.to_string(),
            run_span: span.id(),
        });

        let result = self
            .run_stages(query, span.id())
            .instrument(run_span!(query = %query, run_id = %span.id()))
            .await;

        match &result {
            Ok(output) => {
                span.set_status(SpanStatus::Ok);
                self.metrics.run_completed(started.elapsed(), output.verification.verified);
                info!(
                    run_id = %span.id(),
                    verified = output.verification.verified,
                    "Research run completed"
                );
            }
            Err(e) => {
                let message = e.sanitized_message();
                span.record_error(&message);
                span.set_status(SpanStatus::Error(message.clone()));
                self.metrics.run_failed(started.elapsed());
                error!(run_id = %span.id(), error = %message, "Research run failed");
            }
        }
        span.end();

        result
    }

    async fn run_stages(&mut self, query: &str, run_id: SpanId) -> ResearchResult<ResearchOutput> {
        self.progress
            .update_item(
                "trace_id",
                &format!("Financial research trace started (trace id: {run_id})"),
                true,
                true,
            )
            .await;
        self.progress
            .update_item("start", "Starting financial research...", true, false)
            .await;

        let plan = self
            .plan_searches(query)
            .instrument(stage_span!(stage = %Stage::Plan))
            .await?;
        self.state.advance(RunState::Planned)?;

        let results = self
            .perform_searches(&plan)
            .instrument(stage_span!(stage = "search"))
            .await;
        self.state.advance(RunState::Searched)?;

        let report = self
            .write_report(query, &results)
            .instrument(stage_span!(stage = %Stage::Synthesize))
            .await?;
        self.state.advance(RunState::Synthesized)?;

        let verification = self
            .verify_report(&report)
            .instrument(stage_span!(stage = %Stage::Verify))
            .await?;
        self.state.advance(RunState::Verified)?;

        self.progress
            .update_item(
                "final_report",
                &format!("Report summary\n\n{}", report.short_summary),
                true,
                false,
            )
            .await;
        self.progress.end().await;
        self.state.advance(RunState::Done)?;

        Ok(ResearchOutput {
            report,
            verification,
        })
    }

    fn parent_span(&self) -> Option<SpanId> {
        self.context.as_ref().map(|context| context.run_span)
    }

    /// Ask the planner for the searches to run
    pub async fn plan_searches(&self, query: &str) -> ResearchResult<SearchPlan> {
        let span = self.tracer.start_span(PLAN_SPAN, self.parent_span());
        span.set_attribute("query", query.into());
        span.set_attribute("agent_model", self.agents.planner.model.as_str().into());

        self.progress
            .update_item("planning", "Planning searches...", false, false)
            .await;

        let plan = self
            .executor
            .run(&self.agents.planner, &format!("Query: {query}"))
            .await
            .and_then(|output| output.final_output_as::<SearchPlan>())
            .map_err(|e| fail_stage(span.as_ref(), Stage::Plan, e))?;

        span.set_attribute("num_searches_planned", plan.searches.len().into());
        self.progress
            .update_item(
                "planning",
                &format!("Will perform {} searches", plan.searches.len()),
                true,
                false,
            )
            .await;
        span.end();

        Ok(plan)
    }

    /// Run every planned search concurrently and collect the successful texts
    ///
    /// Results arrive in completion order. This never fails; a search that
    /// errors or panics is counted and dropped.
    pub async fn perform_searches(&self, plan: &SearchPlan) -> Vec<String> {
        let span = self
            .tracer
            .start_span(PERFORM_SEARCHES_SPAN, self.parent_span());
        let total = plan.searches.len();
        span.set_attribute("num_searches_total", total.into());

        self.progress
            .update_item("searching", "Searching...", false, false)
            .await;

        let mut tasks = JoinSet::new();
        for item in plan.searches.iter().cloned() {
            tasks.spawn(
                search(
                    self.executor.clone(),
                    self.agents.search.clone(),
                    self.tracer.clone(),
                    Some(span.id()),
                    item,
                )
                .in_current_span(),
            );
        }

        let mut results = Vec::with_capacity(total);
        let mut completed = 0;
        let mut failed = 0;

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                warn!(error = %e, "Search task did not complete");
                SearchOutcome::Failed
            });

            match outcome {
                SearchOutcome::Text(text) => results.push(text),
                SearchOutcome::Failed => failed += 1,
            }
            completed += 1;

            self.progress
                .update_item(
                    "searching",
                    &format!("Searching... {completed}/{total} completed"),
                    false,
                    false,
                )
                .await;
        }

        span.set_attribute("num_searches_completed", results.len().into());
        span.set_attribute("num_searches_failed", failed.into());
        self.progress.mark_item_done("searching").await;
        self.metrics.searches_finished(total, results.len(), failed);
        span.end();

        info!(total, succeeded = results.len(), failed, "Searches finished");
        results
    }

    /// Stream the report from the writer, with the analysts available as tools
    pub async fn write_report(&self, query: &str, results: &[String]) -> ResearchResult<ReportData> {
        let span = self
            .tracer
            .start_span(WRITE_REPORT_SPAN, self.parent_span());
        span.set_attribute("query", query.into());
        span.set_attribute("num_search_results", results.len().into());
        span.set_attribute("agent_model", self.agents.writer.model.as_str().into());

        let writer = self.writer_with_tools();

        self.progress
            .update_item("writing", "Thinking about report...", false, false)
            .await;

        let input = format!("Original query: {query}\nSummarized search results: {results:?}");
        let report = self
            .stream_report(&writer, input)
            .await
            .map_err(|e| fail_stage(span.as_ref(), Stage::Synthesize, e))?;

        span.set_attribute(
            "report.length",
            report.markdown_report.chars().count().into(),
        );
        span.end();

        Ok(report)
    }

    fn writer_with_tools(&self) -> Agent {
        let fundamentals = AgentTool::new(
            self.agents.financials.clone(),
            self.executor.clone(),
            FUNDAMENTALS_TOOL,
            FUNDAMENTALS_TOOL_DESCRIPTION,
            summary_extractor,
        );
        let risk = AgentTool::new(
            self.agents.risk.clone(),
            self.executor.clone(),
            RISK_TOOL,
            RISK_TOOL_DESCRIPTION,
            summary_extractor,
        );

        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(fundamentals), Arc::new(risk)];
        self.agents.writer.with_tools(tools)
    }

    async fn stream_report(&self, writer: &Agent, input: String) -> Result<ReportData, ExecutorError> {
        let mut run = self.executor.run_streamed(writer, input).await?;
        let mut ticker = ProgressTicker::new(WRITING_UPDATES, self.progress_interval, Instant::now());

        while run.next_event().await.is_some() {
            if let Some(message) = ticker.poll(Instant::now()).map(str::to_string) {
                self.progress
                    .update_item("writing", &message, false, false)
                    .await;
            }
        }
        self.progress.mark_item_done("writing").await;

        debug!(updates_shown = ticker.shown(), "Report stream finished");
        run.final_output().await?.final_output_as::<ReportData>()
    }

    /// Have the verifier audit the markdown report
    pub async fn verify_report(&self, report: &ReportData) -> ResearchResult<VerificationResult> {
        let span = self
            .tracer
            .start_span(VERIFY_REPORT_SPAN, self.parent_span());
        span.set_attribute("agent_model", self.agents.verifier.model.as_str().into());

        self.progress
            .update_item("verifying", "Verifying report...", false, false)
            .await;

        let output = self
            .executor
            .run(&self.agents.verifier, &report.markdown_report)
            .await
            .map_err(|e| fail_stage(span.as_ref(), Stage::Verify, e))?;
        self.progress.mark_item_done("verifying").await;

        let verification = output
            .final_output_as::<VerificationResult>()
            .map_err(|e| fail_stage(span.as_ref(), Stage::Verify, e))?;

        span.set_attribute("verification.passed", verification.verified.into());
        span.end();

        Ok(verification)
    }
}

/// Run one search; failures are recorded on the task's span and returned as `Failed`
pub async fn search(
    executor: Arc<dyn TaskExecutor>,
    agent: Agent,
    tracer: Arc<dyn Tracer>,
    parent: Option<SpanId>,
    item: SearchItem,
) -> SearchOutcome {
    let span = tracer.start_span(SEARCH_SPAN, parent);
    span.set_attribute("search.query", item.query.as_str().into());
    span.set_attribute("search.reason", item.reason.as_str().into());
    span.set_attribute("agent_model", agent.model.as_str().into());

    let input = format!("Search term: {}\nReason: {}", item.query, item.reason);

    let outcome = match executor.run(&agent, &input).await {
        Ok(output) => {
            span.set_attribute("search.success", true.into());
            SearchOutcome::Text(output.final_output)
        }
        Err(e) => {
            let message = e.to_string();
            warn!(query = %item.query, error = %message, "Search failed");
            span.set_attribute("search.success", false.into());
            span.record_error(&message);
            span.set_status(SpanStatus::Error(message));
            SearchOutcome::Failed
        }
    };
    span.end();

    outcome
}

/// Reduce an analyst's structured output to its summary text
pub fn summary_extractor(output: &RunOutput) -> Result<String, ToolError> {
    output
        .final_output_as::<AnalysisSummary>()
        .map(|analysis| analysis.summary)
        .map_err(|e| ToolError::ExecutionError(e.to_string()))
}

/// Record a stage failure on its span and wrap it as fatal
fn fail_stage(span: &dyn SpanHandle, stage: Stage, source: ExecutorError) -> ResearchError {
    let error = ResearchError::stage(stage, source);
    let message = error.sanitized_message();
    span.record_error(&message);
    span.set_status(SpanStatus::Error(message));
    error
}
