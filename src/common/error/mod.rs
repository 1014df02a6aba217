//! Error taxonomy for the translation engine.
//!
//! `types` holds the [`Error`] enum; `conversions` maps third-party errors
//! (zip, quick-xml, serde_json) onto it so stages can use `?` throughout.

// Submodule declarations
pub mod types;
pub mod conversions;

// Re-exports
pub use types::{Error, Result};
