//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Assign generated ids and stamp audit fields on write paths.
//! - Keep embedding layers decoupled from storage details.

pub mod object_service;
pub mod report_service;
pub mod tree_service;
