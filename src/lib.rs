pub mod config;
pub mod error;

pub use config::{load_bytes, load_file, Entries, Entry, Lookup, Store};
pub use error::LoadError;
