// Testing Tools Library
//
// This crate provides testing utilities for the broadcast server.
// Currently includes:
// - sse-test-client: end-to-end smoke tests against a running server

pub mod api_client;
pub mod output;
pub mod scenarios;
pub mod sse_client;
