mod ort_engine;
pub mod image_ops;
pub mod input_wrapper;
pub mod nms;

pub use ort_engine::*;
