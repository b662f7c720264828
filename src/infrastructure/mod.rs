pub mod http;
pub mod local_storage;
pub mod mysql;
pub mod pool;
