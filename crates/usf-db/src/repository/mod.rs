//! SurrealDB repository implementations.

mod override_record;

pub use override_record::SurrealOverrideRepository;
