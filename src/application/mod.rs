//! Application layer: the dump and restore engines and the run-wide services they share.

pub mod dump_engine;
pub mod progress;
pub mod report;
pub mod restore_engine;
pub mod runtime;
