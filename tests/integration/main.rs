//! Integration tests for the pricing gateway.
//!
//! `stub_completion` replaces the upstream with an in-memory double;
//! `fake_upstream` runs a local chat-completions server so the real
//! HTTP client can be exercised without network access.

mod gateway_flow;
mod stub_completion;
