//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `bills` - Offline bill commands (normalize, predict)
//! - `connect` - Interactive onboarding and insights
//! - `core` - Shared utilities (config loading, bill files, insight display)
//! - `service` - Remote lookups (status, service-area)

pub mod bills;
pub mod connect;
pub mod core;
pub mod service;

// Re-export command functions for main.rs
pub use bills::*;
pub use connect::*;
pub use core::*;
pub use service::*;
