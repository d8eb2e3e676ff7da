use nalgebra::Point3;

/// A single simulation snapshot: one alpha-carbon trace per chain.
///
/// Chain order is structurally significant and must be stable across all frames
/// of one trajectory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub chains: Vec<Vec<Point3<f64>>>,
}

impl Frame {
    pub fn new(chains: Vec<Vec<Point3<f64>>>) -> Self {
        Self { chains }
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }
}

/// An ordered, finite, replayable sequence of [`Frame`]s.
///
/// Frames are mutually independent; reconstruction carries no state across them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    pub frames: Vec<Frame>,
}

impl Trajectory {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
