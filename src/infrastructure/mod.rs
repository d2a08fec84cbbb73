pub mod cache;
pub mod delivery;
pub mod messaging;
pub mod repositories;
