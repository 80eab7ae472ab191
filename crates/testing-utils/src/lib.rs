//! # Fleet Testing Utils
//!
//! Shared testing utilities for the fleet control plane.
//! This crate provides fixtures, agent-side helpers and store wrappers
//! that can be used across all other crates in the workspace.
//!
//! ## Features
//!
//! - **Test Data Builders**: Jobs with sensible defaults and task status records
//! - **Agent Simulation**: Writes the status and history nodes an agent would report
//! - **Fault Injection**: A store wrapper that interleaves concurrent modifications
//!   or forced failures with the master's transactions
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! fleet-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
