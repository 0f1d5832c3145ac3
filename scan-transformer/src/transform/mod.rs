use scan_core::pointcloud::point::Point;

pub mod color;
pub mod pose;
pub mod position;

pub trait Transform {
    fn transform(&self, point: Point) -> Point;
}

/// Applies its stages in order.
pub struct CompositeTransform {
    transforms: Vec<Box<dyn Transform>>,
}

impl CompositeTransform {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }
}

impl Transform for CompositeTransform {
    fn transform(&self, point: Point) -> Point {
        self.transforms
            .iter()
            .fold(point, |point, transform| transform.transform(point))
    }
}
