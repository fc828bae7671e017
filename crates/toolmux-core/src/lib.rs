//! # Toolmux Core Library
//!
//! Domain entities and store traits for the toolmux connection manager.
//!
//! ## Modules
//!
//! - `domain` - Core entities (ServerConfig, ServerStatus, ToolPlugin)
//! - `store` - Interfaces to the configuration and secret collaborators

pub mod domain;
pub mod store;

// Re-export commonly used types
pub use domain::*;
pub use store::*;
