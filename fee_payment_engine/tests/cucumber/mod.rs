mod fee_world;
mod setups;
mod steps;

pub use fee_world::FeeWorld;
