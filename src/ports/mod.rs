//! Ports: the traits the engines depend on, implemented by `infrastructure`.

pub mod bulk_load;
pub mod session;
