mod dataset_manifest;
mod monitor;
mod weight_files;

pub use dataset_manifest::{convert_ymir_to_yolov5, DatasetManifest, Split};
pub use monitor::{MonitorFile, NullMonitor, ProgressMonitor, TASK_STATE_RUNNING};
pub use weight_files::{get_weight_file, get_weight_files, select_weight_file, WEIGHT_SUFFIX};

pub use crate::detection_runners::ort_detector::image_ops::{LetterboxInfo, LETTERBOX_FILL};
pub use crate::detection_runners::ort_detector::input_wrapper::X;
