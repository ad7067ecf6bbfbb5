//! Configuration for the beluga CLI
//!
//! Provides types, discovery and parsing for `beluga.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
