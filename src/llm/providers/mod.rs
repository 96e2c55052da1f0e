//! LLM provider implementations
//!
//! This module contains concrete implementations of the LlmProvider trait
//! for different LLM services.

pub mod openai;

pub use openai::*;
