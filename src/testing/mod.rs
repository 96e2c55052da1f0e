//! Testing utilities and mock implementations
//!
//! Scripted executors and providers for exercising the research pipeline
//! without an LLM backend.

pub mod mocks;

pub use mocks::*;
