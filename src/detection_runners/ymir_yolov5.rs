//! YOLOv5 detector adapted to the ymir harness, used for mining and inference.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use image::RgbImage;
use ndarray::{concatenate, s, Array2, ArrayView2, Axis, Ix3};

use crate::common::{get_ymir_process, Annotation, ComputeDevice, Task, TaskPlan, TaskSlot,
                    YmirConfig, YmirError, YmirStage};
use crate::data::{get_weight_file, DatasetManifest, MonitorFile, NullMonitor, ProgressMonitor, X};
use crate::detection_runners::image_ops::{self, check_img_size};
use crate::detection_runners::inference_process::DetectionBackend;
use crate::detection_runners::nms::non_max_suppression;
use crate::detection_runners::OrtEngine;
use crate::utils;

pub const MAX_DET: usize = 100;

pub struct YmirYolov5<B: DetectionBackend = OrtEngine> {
    backend: B,
    monitor: Box<dyn ProgressMonitor>,
    task_slot: TaskSlot,
    device: ComputeDevice,
    batch_size_per_gpu: usize,
    num_workers_per_gpu: usize,
    pin_memory: bool,
    batch_size: usize,
    class_names: Vec<String>,
    stride: u32,
    conf_thres: f32,
    iou_thres: f32,
    agnostic_nms: bool,
    data_yaml: PathBuf,
    img_size: [u32; 2],
}

impl YmirYolov5<OrtEngine> {
    /// Loads the weight file picked by [`get_weight_file`] onto `device` and warms it up.
    ///
    /// `task` is `"mining"` or `"infer"`. The dataset manifest written by
    /// [`crate::data::convert_ymir_to_yolov5`] must already exist.
    pub fn new(cfg: &YmirConfig, task: &str, device: ComputeDevice) -> Result<Self> {
        let task: Task = task.parse()?;

        let weights = match get_weight_file(cfg) {
            Some(weights) => weights,
            None => {
                return Err(YmirError::NoWeightFile {
                    models_dir: cfg.ymir.input.models_dir.clone(),
                    searched: cfg.param.model_params_path.len(),
                }
                .into())
            }
        };

        // manifest first: a missing data.yaml fails before the session is built
        let manifest = Self::load_manifest(cfg)?;
        let backend = OrtEngine::new(&weights, &device, cfg.param.ort_lib_path.as_deref())?;

        Self::build(cfg, task, device, manifest, backend)
    }
}

impl<B: DetectionBackend> YmirYolov5<B> {
    /// Same as [`YmirYolov5::new`] with an already loaded backend.
    pub fn with_backend(cfg: &YmirConfig, task: &str, device: ComputeDevice, backend: B) -> Result<Self> {
        let task: Task = task.parse()?;
        let manifest = Self::load_manifest(cfg)?;
        Self::build(cfg, task, device, manifest, backend)
    }

    fn build(
        cfg: &YmirConfig,
        task: Task,
        device: ComputeDevice,
        manifest: DatasetManifest,
        mut backend: B,
    ) -> Result<Self> {
        let task_slot = TaskPlan::from_flags(cfg.ymir.run_mining, cfg.ymir.run_infer).slot(task);

        let class_names = cfg.param.class_names.clone();
        if let Some(names) = backend.names() {
            if names.len() != class_names.len() {
                log::warn!("model embeds {} class names, configuration has {}", names.len(), class_names.len());
            }
        }

        let batch_size_per_gpu = cfg.param.batch_size_per_gpu;
        let batch_size = batch_size_per_gpu * device.device_count();

        let stride = backend.stride();
        let img_size = check_img_size(cfg.param.img_size, stride);
        let img_size = [img_size, img_size];

        let warmup = X::zeros(&[1, 3, img_size[0] as usize, img_size[1] as usize]);
        backend.run(&warmup)?;

        let monitor: Box<dyn ProgressMonitor> = if cfg.ymir.output.monitor_file.as_os_str().is_empty() {
            Box::new(NullMonitor)
        } else {
            Box::new(MonitorFile::from_config(cfg))
        };

        log::info!(
            "YmirYolov5 ready | task {:?} ({}/{}) | device {:?} | batch {} | img_size {:?} | classes {}",
            task,
            task_slot.index,
            task_slot.total,
            device.device(),
            batch_size,
            img_size,
            manifest.nc,
        );

        Ok(Self {
            backend,
            monitor,
            task_slot,
            device,
            batch_size_per_gpu,
            num_workers_per_gpu: cfg.param.num_workers_per_gpu,
            pin_memory: cfg.param.pin_memory,
            batch_size,
            class_names,
            stride,
            conf_thres: cfg.param.conf_thres,
            iou_thres: cfg.param.iou_thres,
            agnostic_nms: cfg.param.agnostic_nms,
            data_yaml: cfg.data_yaml(),
            img_size,
        })
    }

    fn load_manifest(cfg: &YmirConfig) -> Result<DatasetManifest> {
        let manifest = DatasetManifest::load(cfg.data_yaml())?;
        if manifest.nc != cfg.param.class_names.len() {
            return Err(YmirError::ClassCountMismatch {
                manifest: manifest.nc,
                configured: cfg.param.class_names.len(),
            }
            .into());
        }
        Ok(manifest)
    }

    /// Replaces the progress sink.
    pub fn with_monitor<M: ProgressMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Box::new(monitor);
        self
    }

    /// Feature maps before sigmoid, for mining.
    pub fn extract_feats(&mut self, xs: &X) -> Result<Vec<X>> {
        self.backend.run_feats(xs)
    }

    /// Runs the network on a `(batch, 3, h, w)` input.
    ///
    /// Without `nms` each image gets its raw `(anchors, 5 + nc)` predictions; with
    /// `nms` it gets `(k, 6)` rows of `x1, y1, x2, y2, conf, cls` in input coordinates.
    pub fn forward(&mut self, xs: &X, nms: bool) -> Result<Vec<Array2<f32>>> {
        let pred = self.backend.run(xs)?.into_inner();
        let shape = pred.shape().to_vec();
        let nc = self.class_names.len();
        if shape.len() != 3 || shape[2] != 5 + nc {
            return Err(YmirError::UnexpectedOutputShape { shape, nc }.into());
        }
        let pred = pred.into_dimensionality::<Ix3>()?;

        let ys = pred
            .axis_iter(Axis(0))
            .map(|preds| {
                if nms {
                    non_max_suppression(preds, self.conf_thres, self.iou_thres, self.agnostic_nms, MAX_DET)
                } else {
                    preds.to_owned()
                }
            })
            .collect();
        Ok(ys)
    }

    /// Detects objects in one RGB image.
    ///
    /// Returns `(n, 6)` rows of `x1, y1, x2, y2, conf, cls` in source pixel coordinates;
    /// `n` is zero when nothing passes the thresholds.
    pub fn predict(&mut self, img: &RgbImage) -> Result<Array2<f32>> {
        let detect_time = Instant::now();
        let mut elapsed = detect_time.elapsed();

        let (xs, info) = image_ops::preprocess(img, self.img_size[0], self.stride)?;
        elapsed = utils::trace("predict", "preprocess", detect_time, elapsed);

        let preds = self.forward(&xs, true)?;
        elapsed = utils::trace("predict", "forward", detect_time, elapsed);

        let mut result = Vec::new();
        for mut det in preds {
            if det.nrows() == 0 {
                continue;
            }
            {
                let mut boxes = det.slice_mut(s![.., 0..4]);
                image_ops::scale_boxes(&info, &mut boxes);
                boxes.mapv_inplace(f32::round);
            }
            result.push(det);
        }
        utils::trace("predict", "postprocess", detect_time, elapsed);

        if result.is_empty() {
            return Ok(Array2::zeros((0, 6)));
        }
        let views: Vec<ArrayView2<f32>> = result.iter().map(|x| x.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }

    /// [`Self::predict`] for BGR pixel data (`width * height * 3` bytes).
    pub fn predict_bgr(&mut self, width: u32, height: u32, bgr: &[u8]) -> Result<Array2<f32>> {
        let img = image_ops::bgr_to_rgb(width, height, bgr)?;
        self.predict(&img)
    }

    pub fn infer(&mut self, img: &RgbImage) -> Result<Vec<Annotation>> {
        let result = self.predict(img)?;

        let mut anns = Vec::with_capacity(result.nrows());
        for row in result.rows() {
            anns.push(Annotation::from_row(row, &self.class_names)?);
        }
        Ok(anns)
    }

    /// Reports progress `p` of `stage` for this detector's task.
    pub fn write_monitor_logger(&mut self, stage: YmirStage, p: f32) -> Result<()> {
        let percent = get_ymir_process(stage, p, self.task_slot)?;
        self.monitor.write_monitor_logger(percent)
    }

    pub fn task_slot(&self) -> TaskSlot {
        self.task_slot
    }

    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    pub fn batch_size_per_gpu(&self) -> usize {
        self.batch_size_per_gpu
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_workers_per_gpu(&self) -> usize {
        self.num_workers_per_gpu
    }

    pub fn pin_memory(&self) -> bool {
        self.pin_memory
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn img_size(&self) -> [u32; 2] {
        self.img_size
    }

    pub fn data_yaml(&self) -> &PathBuf {
        &self.data_yaml
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
