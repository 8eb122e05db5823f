extern crate ymir_yolov5;

use std::path::PathBuf;
use std::time::Instant;

use ymir_yolov5::common::ComputeDevice;
use ymir_yolov5::data::convert_ymir_to_yolov5;
use ymir_yolov5::detection_runners::OrtEngine;
use ymir_yolov5::YmirYolov5;

mod fake_backend;
use fake_backend::test_config;

const COCO_NAMES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Needs a YOLOv5 COCO export in `YMIR_TEST_MODEL` and a test image in `YMIR_TEST_IMAGE`.
#[test]
#[ignore]
fn yolov5_onnx_detection() {
    let model = PathBuf::from(std::env::var("YMIR_TEST_MODEL").expect("YMIR_TEST_MODEL not set"));
    let image_path = std::env::var("YMIR_TEST_IMAGE").expect("YMIR_TEST_IMAGE not set");

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path(), &COCO_NAMES);
    cfg.ymir.input.models_dir = model.parent().unwrap().to_path_buf();
    cfg.param.model_params_path = vec![model.file_name().unwrap().to_string_lossy().into_owned()];
    cfg.param.ort_lib_path = std::env::var("YMIR_ORT_LIB").ok();
    convert_ymir_to_yolov5(&cfg).unwrap();

    let mut yolo: YmirYolov5<OrtEngine> = match YmirYolov5::new(&cfg, "infer", ComputeDevice::cpu()) {
        Ok(yolo) => yolo,
        Err(e) => panic!("Failed to initialize YOLOv5 model: {e:?}"),
    };
    assert_eq!(yolo.stride(), 32);
    println!("input {} outputs {:?} on {}", yolo.backend().in_name(), yolo.backend().out_names(), yolo.backend().device().str());

    let image = image::open(&image_path).unwrap().to_rgb8();
    let now = Instant::now();
    let anns = yolo.infer(&image).unwrap();
    println!("{} detections in {:.2?}", anns.len(), now.elapsed());

    for ann in anns.iter() {
        println!("{} {:.3} {:?}", ann.class_name, ann.score, ann.bbox);
        assert!(ann.bbox.x >= 0 && ann.bbox.y >= 0);
        assert!(ann.bbox.x + ann.bbox.w <= image.width() as i32);
        assert!(ann.bbox.y + ann.bbox.h <= image.height() as i32);
        assert!(ann.score > cfg.param.conf_thres);
    }
}
