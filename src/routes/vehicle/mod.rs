mod handler;
mod model;

pub use handler::{compare_vehicle_emissions, list_vehicle_emissions};
pub use model::{CompareResponse, EmissionsPage, VehicleEmission};
