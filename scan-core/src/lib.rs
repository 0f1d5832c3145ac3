pub mod math;
pub mod pointcloud;
