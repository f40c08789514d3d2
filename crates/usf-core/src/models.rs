//! Domain models for the user override layer.
//!
//! These are the core types shared across all crates.

pub mod color;
pub mod group;
pub mod identity;
pub mod record;
