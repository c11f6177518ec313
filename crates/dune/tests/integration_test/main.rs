//! Integration tests for dunefetch-dune.
//!
//! Everything here runs offline: the remote API is either a scripted
//! in-memory implementation of `ExecutionApi` or a local axum server.


mod pipeline;
mod poll;
