/// Cache and counter key builders

pub mod rate_limit_keys;
pub mod vehicle_keys;

pub use rate_limit_keys::rate_limit_key;
pub use vehicle_keys::{vehicle_compare_key, vehicle_emissions_key};
