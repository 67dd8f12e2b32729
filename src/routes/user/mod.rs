mod handler;
mod model;

pub use handler::{login, protected_endpoint, register};
