use scan_core::pointcloud::point::Point;

use crate::transform::Transform;

pub trait Transformer {
    fn execute(&self, point: Point) -> Point;
}

pub struct PointTransformer {
    transform: Box<dyn Transform>,
}

impl PointTransformer {
    pub fn new(transform: Box<dyn Transform>) -> Self {
        Self { transform }
    }
}

impl Transformer for PointTransformer {
    fn execute(&self, point: Point) -> Point {
        let transformed = self.transform.transform(point);
        log::trace!(
            "{:?} {:?} -> {:?} {:?}",
            point.position,
            point.color,
            transformed.position,
            transformed.color
        );
        transformed
    }
}
