use scan_core::pointcloud::{point::Point, scan::ScanPose};

use super::Transform;

/// Moves scanner-local positions into the world frame of the scan pose.
#[derive(Debug, Clone, Copy)]
pub struct ScanPoseTransform {
    pub pose: ScanPose,
}

impl Transform for ScanPoseTransform {
    fn transform(&self, mut point: Point) -> Point {
        point.position = self.pose.to_world(point.position);
        point
    }
}
