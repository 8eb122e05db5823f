use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the adapter itself. Backend, IO and image errors are passed
/// through untouched inside `anyhow::Error`.
#[derive(Debug, Error)]
pub enum YmirError {
    #[error("no weights file specified! searched {searched} candidate(s) under {models_dir:?}")]
    NoWeightFile { models_dir: PathBuf, searched: usize },

    #[error("unknown task {0}")]
    UnknownTask(String),

    #[error("dataset manifest declares {manifest} classes but class_names has {configured}")]
    ClassCountMismatch { manifest: usize, configured: usize },

    #[error("p not in [0,1], p={0}")]
    ProgressOutOfRange(f32),

    #[error("class index {index} is outside of the {nc} configured class names")]
    InvalidClassIndex { index: usize, nc: usize },

    #[error("invalid device identifier '{0}'")]
    InvalidDevice(String),

    #[error("model does not expose feature maps next to its detection output")]
    MissingFeatures,

    #[error("unexpected model output shape {shape:?}, expected [batch, anchors, 5 + {nc}]")]
    UnexpectedOutputShape { shape: Vec<usize>, nc: usize },
}
