pub mod building;
pub mod catalog;
pub mod recipe;

pub use building::{Building, ProductionState};
pub use catalog::{BuildingCatalog, BuildingDef, HousingDef, default_building_defs};
pub use recipe::Recipe;
