pub mod generator;
pub mod integrity;
