//! pgsession core types and traits
//!
//! This crate provides the types shared between the session-management host and
//! its storage backends:
//! - The persisted `Session` record
//! - The `SessionStore` capability trait
//! - Core error types

pub mod error;
pub mod session;
pub mod session_store;

pub use error::{Error, Result};
pub use session::{Agent, Session};
pub use session_store::SessionStore;
