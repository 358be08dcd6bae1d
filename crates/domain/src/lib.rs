//! Domain layer for the vision agent
//!
//! Contains model manifests, prediction results, value objects and domain
//! errors. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
