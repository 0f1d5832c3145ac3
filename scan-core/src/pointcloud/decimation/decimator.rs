pub trait PointDecimator {
    /// Called once per streamed point, in source order. Returns whether the point is kept.
    fn advance(&mut self) -> bool;

    /// Number of points seen so far.
    fn seen(&self) -> u64;
}

/// Keeps one point out of every `stride`, counting every streamed point
/// (including the ones later dropped as invalid) so the selection stays aligned
/// with the source order.
#[derive(Debug, Clone)]
pub struct StrideDecimator {
    stride: u64,
    counter: u64,
}

impl StrideDecimator {
    pub fn new(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
            counter: 0,
        }
    }
}

impl PointDecimator for StrideDecimator {
    fn advance(&mut self) -> bool {
        let keep = self.counter % self.stride == 0;
        self.counter += 1;
        keep
    }

    fn seen(&self) -> u64 {
        self.counter
    }
}
