extern crate ymir_yolov5;

use std::str::FromStr;

use ymir_yolov5::common::{get_ymir_process, Task, TaskPlan, TaskSlot, YmirStage};
use ymir_yolov5::data::{MonitorFile, NullMonitor, ProgressMonitor};
use ymir_yolov5::YmirError;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn mining_and_infer_share_the_run() {
    let plan = TaskPlan::from_flags(true, true);
    assert_eq!(plan, TaskPlan::MiningThenInfer);

    let mining = plan.slot(Task::Mining);
    let infer = plan.slot(Task::Infer);
    assert!(close(get_ymir_process(YmirStage::Task, 0.5, mining).unwrap(), 0.25));
    assert!(close(get_ymir_process(YmirStage::Task, 0.5, infer).unwrap(), 0.75));
    assert!(close(get_ymir_process(YmirStage::Postprocess, 1.0, mining).unwrap(), 0.5));
    assert!(close(get_ymir_process(YmirStage::Postprocess, 1.0, infer).unwrap(), 1.0));
}

#[test]
fn single_task_owns_the_whole_run() {
    for (run_mining, run_infer) in [(true, false), (false, true), (false, false)] {
        let plan = TaskPlan::from_flags(run_mining, run_infer);
        assert_eq!(plan, TaskPlan::Single);
        assert_eq!(plan.slot(Task::Infer), TaskSlot::default());
        assert_eq!(plan.slot(Task::Mining), TaskSlot { index: 0, total: 1 });
    }
}

#[test]
fn stage_weights() {
    let slot = TaskSlot::default();
    assert!(close(get_ymir_process(YmirStage::Preprocess, 0.0, slot).unwrap(), 0.0));
    assert!(close(get_ymir_process(YmirStage::Preprocess, 1.0, slot).unwrap(), 0.1));
    assert!(close(get_ymir_process(YmirStage::Task, 0.0, slot).unwrap(), 0.1));
    assert!(close(get_ymir_process(YmirStage::Task, 1.0, slot).unwrap(), 0.9));
    assert!(close(get_ymir_process(YmirStage::Postprocess, 0.5, slot).unwrap(), 0.95));
}

#[test]
fn progress_is_monotonic_within_a_task() {
    let slot = TaskSlot { index: 1, total: 2 };
    let mut prev = 0.0;
    for stage in [YmirStage::Preprocess, YmirStage::Task, YmirStage::Postprocess] {
        for i in 0..=10 {
            let v = get_ymir_process(stage, i as f32 / 10., slot).unwrap();
            assert!(v + 1e-6 >= prev, "{v} < {prev}");
            prev = v;
        }
    }
}

#[test]
fn out_of_range_progress_is_rejected() {
    let slot = TaskSlot::default();
    for p in [-0.01, 1.01, f32::NAN] {
        let err = get_ymir_process(YmirStage::Task, p, slot).unwrap_err();
        assert!(matches!(err, YmirError::ProgressOutOfRange(_)));
    }
}

#[test]
fn task_labels() {
    assert_eq!(Task::from_str("mining").unwrap(), Task::Mining);
    assert_eq!(Task::from_str("INFER").unwrap(), Task::Infer);
    assert!(matches!(Task::from_str("train"), Err(YmirError::UnknownTask(t)) if t == "train"));
    assert!(Task::from_str("").is_err());
}

#[test]
fn monitor_file_holds_the_latest_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.txt");
    let mut monitor = MonitorFile::new("task-1", &path);
    assert_eq!(monitor.path(), path.as_path());

    monitor.write_monitor_logger(0.1).unwrap();
    monitor.write_monitor_logger(0.456).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1);
    let fields: Vec<&str> = text.trim_end().split('\t').collect();
    assert_eq!(fields[0], "task-1");
    assert!(fields[1].parse::<f64>().unwrap() > 0.);
    assert_eq!(fields[2], "0.46");
    assert_eq!(fields[3], "2");
}

#[test]
fn monitor_file_in_missing_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = MonitorFile::new("task-1", dir.path().join("nope/monitor.txt"));
    assert!(monitor.write_monitor_logger(0.5).is_err());
    assert!(NullMonitor.write_monitor_logger(0.5).is_ok());
}
