//! LLM provider abstraction layer
//!
//! This module provides a provider-agnostic interface for LLM interactions,
//! with an OpenAI-compatible backend.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
