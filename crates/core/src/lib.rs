//! Core library for minutes
//!
//! This crate implements the **Functional Core** of the minutes application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The minutes project uses a two-crate architecture to enforce separation of concerns:
//!
//! - **`minutes_core`** (this crate): Pure transformation functions with zero I/O
//! - **`minutes`**: HTTP clients, files, the CLI and the web endpoint (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! All functions in this crate adhere to these principles:
//!
//! - **Pure functions**: Same input always produces the same output
//! - **No side effects**: No I/O operations, no external state mutations
//! - **Deterministic**: Behavior is predictable and reproducible
//! - **Testable**: Can be tested with simple fixture data, no mocking required
//!
//! # Module Organization
//!
//! - [`card`]: Markdown summary to card title, description and checklists
//! - [`prompt`]: Summarizer system prompt resolution
//! - [`transcript`]: Word document XML to transcript text
//! - [`board`]: Trello models and list selection
//! - [`graph`]: Microsoft Graph models and meeting/transcript selection
//!
//! # Example Usage
//!
//! ```rust
//! use minutes_core::card::transform;
//!
//! let card = transform("# Sync\n\nNotes\n\n## Actions & Follow-Up\n- ship it\n");
//!
//! assert_eq!(card.title.as_deref(), Some("Sync"));
//! assert_eq!(card.description, "Notes");
//! assert_eq!(card.checklists[0].items, vec!["ship it".to_string()]);
//! ```

pub mod board;
pub mod card;
pub mod graph;
pub mod prompt;
pub mod transcript;
