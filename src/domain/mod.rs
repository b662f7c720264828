//! Domain layer: entities, errors, file naming and the pure value encoders.

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod file_naming;
