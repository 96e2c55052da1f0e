//! Tools backed by external services

pub mod web_search;

pub use web_search::{WebSearchConfig, WebSearchTool, WEB_SEARCH_TOOL};
