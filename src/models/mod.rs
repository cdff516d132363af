pub mod aoi;
pub mod change;
pub mod job;
