/// Cache operations built on the shared store

pub mod response;

pub use response::{CacheError, ResponseCache};
