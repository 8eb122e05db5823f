use anyhow::Result;

use crate::data::X;

/// A loaded YOLOv5 network the detector adapter drives.
pub trait DetectionBackend {
    /// Largest downsampling factor of the detection head.
    fn stride(&self) -> u32;

    /// Class names embedded in the model, if any.
    fn names(&self) -> Option<Vec<String>>;

    /// Runs the network; returns predictions shaped `[batch, anchors, 5 + nc]`.
    fn run(&mut self, xs: &X) -> Result<X>;

    /// Runs the network; returns the per-level head feature maps before the sigmoid.
    fn run_feats(&mut self, xs: &X) -> Result<Vec<X>>;
}
