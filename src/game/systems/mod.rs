pub mod burn;
pub mod orbit;
