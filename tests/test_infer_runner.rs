extern crate ymir_yolov5;

use image::RgbImage;
use ymir_yolov5::common::ComputeDevice;
use ymir_yolov5::data::convert_ymir_to_yolov5;
use ymir_yolov5::detection_runners::infer_runner::{read_index_file, run_infer, InferResult, ResultSink};
use ymir_yolov5::YmirYolov5;

mod fake_backend;
use fake_backend::{test_config, FakeBackend};

#[derive(Default)]
struct CollectSink {
    results: Vec<InferResult>,
}

impl ResultSink for CollectSink {
    fn write_infer_result(&mut self, infer_result: &InferResult) -> anyhow::Result<()> {
        self.results.push(infer_result.clone());
        Ok(())
    }
}

#[test]
fn index_lines_resolve_against_assets_dir() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.tsv");
    std::fs::write(&index, "a.png\ta.txt\n\n/abs/b.png\n  \n").unwrap();

    let assets = dir.path().join("assets");
    let paths = read_index_file(&index, &assets).unwrap();
    assert_eq!(paths, vec![assets.join("a.png"), std::path::PathBuf::from("/abs/b.png")]);

    assert!(read_index_file(dir.path().join("missing.tsv"), &assets).is_err());
}

#[test]
fn every_candidate_gets_annotations() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path(), &["cat", "dog"]);
    convert_ymir_to_yolov5(&cfg).unwrap();

    let assets = &cfg.ymir.input.assets_dir;
    std::fs::create_dir_all(assets).unwrap();
    RgbImage::new(64, 48).save(assets.join("a.png")).unwrap();
    RgbImage::new(32, 32).save(assets.join("b.png")).unwrap();
    std::fs::write(&cfg.ymir.input.candidate_index_file, "a.png\nb.png\n").unwrap();

    let backend = FakeBackend::new(2).with_row(&[320., 320., 100., 100., 0.9, 0.2, 0.9]);
    let mut yolo = YmirYolov5::with_backend(&cfg, "infer", ComputeDevice::cpu(), backend).unwrap();

    let mut sink = CollectSink::default();
    let n = run_infer(&mut yolo, &cfg, &mut sink).unwrap();
    assert_eq!(n, 2);
    assert_eq!(sink.results.len(), 1);

    let result = &sink.results[0];
    assert_eq!(result.len(), 2);
    let key = assets.join("a.png").to_string_lossy().into_owned();
    let anns = &result[&key];
    assert_eq!(anns.len(), 1);
    assert_eq!(anns[0].class_name, "dog");

    let monitor = std::fs::read_to_string(&cfg.ymir.output.monitor_file).unwrap();
    assert_eq!(monitor.trim_end().split('\t').nth(2), Some("1.00"));
}

#[test]
fn unreadable_image_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path(), &["cat"]);
    convert_ymir_to_yolov5(&cfg).unwrap();
    std::fs::create_dir_all(&cfg.ymir.input.assets_dir).unwrap();
    std::fs::write(&cfg.ymir.input.candidate_index_file, "missing.png\n").unwrap();

    let mut yolo = YmirYolov5::with_backend(&cfg, "infer", ComputeDevice::cpu(), FakeBackend::new(1)).unwrap();
    let mut sink = CollectSink::default();
    assert!(run_infer(&mut yolo, &cfg, &mut sink).is_err());
    assert!(sink.results.is_empty());
}
