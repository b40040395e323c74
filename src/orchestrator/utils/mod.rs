//! Utility modules for orchestration.
//!
//! - [`fs`] - Synchronous, idempotent file operations for scratch state
//! - [`http`] - GET client for backend artifacts

pub mod fs;
pub mod http;
