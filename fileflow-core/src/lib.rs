//! Core functionality for fileflow
//!
//! This crate contains the rule evaluation and execution engine that organizes
//! files as they appear, plus the content classification engine that fingerprints
//! files, scores their similarity, and labels them.

pub mod config;
pub mod content;
pub mod monitor;
pub mod service;
pub mod workflow;

pub use config::FileflowConfig;
pub use content::{ContentAnalyzer, ContentError};
pub use service::FileflowService;
pub use workflow::{WorkflowEngine, WorkflowError};
