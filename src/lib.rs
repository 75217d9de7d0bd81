//! Catalog Agent Orchestrator
//!
//! A multi-agent service answering artists' natural-language questions
//! about a music catalog:
//! - Routes each question to exactly one responder (LLM classification)
//! - Verification answers from a static knowledge base
//! - Analytics runs a select → execute → format tool pipeline over the
//!   catalog (LLM excluded from execution and formatting)
//! - General handles everything else and never hard-fails
//!
//! PIPELINE:
//! QUESTION → ROUTE → EXECUTE RESPONDER → OUTCOME

pub mod agents;
pub mod api;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod knowledge;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod workflow;

pub use error::{AgentError, Result};

// Re-export common types
pub use models::*;
pub use workflow::WorkflowEngine;
