//! Pricing gateway — structured renovation price estimates from an LLM.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod request;
pub mod llm;
pub mod recovery;
pub mod server;
