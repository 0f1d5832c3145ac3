pub mod decimation;
pub mod point;
pub mod scan;
