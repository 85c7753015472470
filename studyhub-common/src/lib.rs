//! # StudyHub Common Library
//!
//! Shared code for the StudyHub orchestration services:
//! - Learning plan and task content models (with structural validation)
//! - Session event types and the EventBus
//! - Gateway configuration loading
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
