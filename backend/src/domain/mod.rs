// Domain layer - session policy, join requests, value objects
// No dependencies on other layers

pub mod entities;
pub mod error;
pub mod value_objects;

pub use entities::*;
pub use error::DomainError;
pub use value_objects::*;
