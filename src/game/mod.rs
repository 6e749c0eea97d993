pub mod constants;
pub mod craft;
pub mod registry;
pub mod systems;
