//! # Carrel Core
//!
//! Shared state logic for Carrel: wire models, the error taxonomy, the
//! backend abstraction, the conversation session store, the query cache
//! with its invalidation graph, the async operation lifecycle, the
//! citation resolver, and project composition rules.
//!
//! This crate performs no I/O. Everything here is driven by the `carrel`
//! binary crate (HTTP gateway, persistence, CLI) or by tests through the
//! in-memory backend.

pub mod backend;
pub mod cache;
pub mod citations;
pub mod compose;
pub mod error;
pub mod models;
pub mod ops;
pub mod session;
