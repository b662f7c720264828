pub mod chunk_writer;
pub mod file_classifier;
