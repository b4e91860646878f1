pub mod chain;
pub mod pool;

pub use chain::ProductionChain;
pub use pool::{Resource, ResourceDef, ResourcePool, TierCaps};
