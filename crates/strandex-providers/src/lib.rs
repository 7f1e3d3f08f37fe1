//! strandex-providers: Generation backends for strandex
//!
//! This crate provides the local llama.cpp backend: a `Provider` that speaks
//! the `llama-server` completion protocol and a `BackendLoader` that starts
//! or attaches to the server.

pub mod llama;
pub mod loader;

pub use llama::LlamaServerProvider;
pub use loader::{default_threads, LlamaConfig, LlamaLoader, LlamaServerProcess};
