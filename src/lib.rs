//! # Carrel
//!
//! A terminal client for a retrieval-augmented research corpus.
//!
//! Carrel talks to a corpus service that indexes academic PDFs, answers
//! questions with inline citations, and assembles research projects into
//! exportable write-ups. The client keeps a persistent chat session on disk,
//! caches reads with explicit invalidation, and tracks every in-flight
//! request so the UI always knows what state the data is in.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  CLI / REPL │──▶│    Client    │──▶│ HTTP gateway │
//! │  (carrel)   │   │ cache + ops  │   │   /api/v1    │
//! └─────────────┘   └──────┬───────┘   └──────────────┘
//!                          │
//!                   ┌──────▼───────┐
//!                   │ Session file │
//!                   │    (JSON)    │
//!                   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! carrel index folder ./papers          # index a directory of PDFs
//! carrel chat                           # interactive Q&A with citations
//! carrel ask "what is attention?"       # one-shot question
//! carrel docs list --search bert
//! carrel projects create --title "Survey"
//! carrel health --watch                 # poll backend status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`api`] | HTTP gateway to the corpus service |
//! | [`client`] | Cached, session-carrying client facade |
//! | [`persist`] | Session file load/save |
//! | [`chat`] | Interactive REPL and one-shot questions |
//! | [`documents`] | Document listing, inspection, references |
//! | [`indexing`] | File/folder indexing and PDF upload |
//! | [`projects`] | Project sources, sections, and export |
//! | [`health`] | Backend health checks and corpus statistics |

pub mod api;
pub mod chat;
pub mod client;
pub mod config;
pub mod documents;
pub mod health;
pub mod indexing;
pub mod persist;
pub mod projects;
