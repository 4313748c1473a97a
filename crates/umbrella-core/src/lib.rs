//! Core domain types for the umbrella lending desk.
//!
//! Everything the other crates agree on lives here: the borrow/return
//! [`Action`], the per-student [`UmbrellaStatus`], validated [`StudentId`]s,
//! the [`TagReading`] produced by the card reader, and the shared constants
//! that pin down dump parsing and pipeline pacing.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
