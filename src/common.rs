mod annotation;
mod errors;
mod inference_device;
mod task;
mod yolo_box;
mod ymir_config;

pub use annotation::*;
pub use errors::*;
pub use inference_device::*;
pub use task::*;
pub use yolo_box::*;
pub use ymir_config::*;
