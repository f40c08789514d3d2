//! USF Core — domain models, permission resolution primitives and the
//! record repository abstraction shared by every other crate.

pub mod error;
pub mod models;
pub mod permission;
pub mod repository;
