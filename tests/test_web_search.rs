//! Web search tool behavior against a mock Serper endpoint
//!
//! The search agent is driven by a scripted model that calls `web_search`;
//! the tool's results must reach the model's next turn.

use finresearch::agents::{ResearchAgents, SearchItem};
use finresearch::llm::provider::MessageRole;
use finresearch::observability::InMemoryTracer;
use finresearch::pipeline::{search, SearchOutcome};
use finresearch::runner::{LlmRunner, TaskExecutor};
use finresearch::testing::MockLlmProvider;
use finresearch::tools::{Tool, WebSearchConfig, WebSearchTool};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn web_search_tool(server: &MockServer) -> Arc<dyn Tool> {
    Arc::new(
        WebSearchTool::new(WebSearchConfig {
            api_key: "serper-test-key".to_string(),
            base_url: server.uri(),
            max_results: 3,
            ..Default::default()
        })
        .unwrap(),
    )
}

fn apple_item() -> SearchItem {
    SearchItem {
        query: "Apple Q3 revenue".to_string(),
        reason: "Headline numbers".to_string(),
    }
}

#[tokio::test]
async fn test_search_agent_summarizes_live_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("X-API-KEY", "serper-test-key"))
        .and(body_partial_json(json!({"q": "Apple Q3 revenue", "num": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic": [
                {
                    "title": "Apple reports third quarter results",
                    "link": "https://example.com/apple-q3",
                    "snippet": "Revenue of $94.0 billion, up 10 percent year over year",
                    "date": "Jul 31, 2025"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(MockLlmProvider::new(vec![
        MockLlmProvider::tool_call_response(vec![(
            "web_search",
            json!({"query": "Apple Q3 revenue", "num_results": 8}),
        )]),
        MockLlmProvider::text_response("Apple grew revenue 10% to $94.0B."),
    ]));
    let executor: Arc<dyn TaskExecutor> = Arc::new(LlmRunner::new(provider.clone()));
    let agents = ResearchAgents::default().with_search_tools(vec![web_search_tool(&server)]);

    let outcome = search(
        executor,
        agents.search.clone(),
        Arc::new(InMemoryTracer::new()),
        None,
        apple_item(),
    )
    .await;

    assert_eq!(
        outcome,
        SearchOutcome::Text("Apple grew revenue 10% to $94.0B.".to_string())
    );

    let requests = provider.requests().await;
    let offered = requests[0].tools.as_ref().unwrap();
    assert_eq!(offered[0].name, "web_search");

    let tool_results = requests[1].messages.last().unwrap();
    assert_eq!(tool_results.role, MessageRole::User);
    assert!(tool_results.content.contains("Tool web_search returned:"));
    assert!(tool_results.content.contains("https://example.com/apple-q3"));
    assert!(tool_results.content.contains("up 10 percent"));
}

#[tokio::test]
async fn test_search_api_failure_is_reported_to_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let provider = Arc::new(MockLlmProvider::new(vec![
        MockLlmProvider::tool_call_response(vec![("web_search", json!({"query": "AAPL"}))]),
        MockLlmProvider::text_response("No live data was available."),
    ]));
    let runner = LlmRunner::new(provider.clone());
    let agents = ResearchAgents::default().with_search_tools(vec![web_search_tool(&server)]);

    let output = runner.run(&agents.search, "Search term: AAPL").await.unwrap();

    assert_eq!(output.text(), "No live data was available.");
    let tool_results = &provider.requests().await[1].messages[3].content;
    assert!(tool_results.contains("Tool web_search failed:"));
    assert!(tool_results.contains("Search API error (403): invalid api key"));
}
