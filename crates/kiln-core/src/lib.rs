//! Kiln Core - Foundational types for the Kiln asset pipeline
//!
//! This crate provides the types every other Kiln crate depends on:
//! - `KilnError` - the pipeline error taxonomy, with a `Result` alias
//! - `ContentHash` - SHA-256 content hashing for content-addressed artifacts

mod error;
mod hash;

pub use error::{KilnError, Result};
pub use hash::{ContentHash, HASH_PREFIX};
