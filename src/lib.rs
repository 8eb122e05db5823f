//! YOLOv5 detector adapter for the ymir training/mining/inference harness.
//!
//! The usual flow is: load [`common::YmirConfig`], write the dataset manifest with
//! [`data::convert_ymir_to_yolov5`], build a [`YmirYolov5`] and run
//! [`detection_runners::infer_runner::run_infer`] (or call [`YmirYolov5::infer`]
//! per image).

mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;

pub use crate::common::{Annotation, ComputeDevice, YmirConfig, YmirError, YmirStage};
pub use crate::data::{convert_ymir_to_yolov5, get_weight_file};
pub use crate::detection_runners::ymir_yolov5::YmirYolov5;
