pub mod inference_process;
pub mod infer_runner;
pub mod ort_detector;
pub mod ymir_yolov5;

pub use ort_detector::*;
