#![allow(dead_code)]

use std::path::Path;

use ndarray::{Array, IxDyn};
use ymir_yolov5::common::{UserParams, YmirConfig, YmirEnv, YmirInput, YmirOutput};
use ymir_yolov5::data::X;
use ymir_yolov5::detection_runners::inference_process::DetectionBackend;
use ymir_yolov5::YmirError;

/// Backend that answers every run with the same prediction rows.
#[derive(Debug, Clone)]
pub(crate) struct FakeBackend {
    pub stride: u32,
    pub nc: usize,
    pub names: Option<Vec<String>>,
    /// Rows of `cx, cy, w, h, obj, cls_0 .. cls_nc` in network input coordinates.
    pub rows: Vec<Vec<f32>>,
    pub with_feats: bool,
    /// Shapes of every input seen, warmup included.
    pub seen_shapes: Vec<Vec<usize>>,
}

impl FakeBackend {
    pub fn new(nc: usize) -> Self {
        Self {
            stride: 32,
            nc,
            names: None,
            rows: vec![],
            with_feats: false,
            seen_shapes: vec![],
        }
    }

    pub fn with_row(mut self, row: &[f32]) -> Self {
        assert_eq!(row.len(), 5 + self.nc);
        self.rows.push(row.to_vec());
        self
    }
}

impl DetectionBackend for FakeBackend {
    fn stride(&self) -> u32 {
        self.stride
    }

    fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    fn run(&mut self, xs: &X) -> anyhow::Result<X> {
        self.seen_shapes.push(xs.shape().to_vec());
        let batch = xs.shape()[0];
        let cols = 5 + self.nc;
        let data: Vec<f32> = (0..batch)
            .flat_map(|_| self.rows.iter().flatten().copied().collect::<Vec<f32>>())
            .collect();
        X::from_shape_vec(&[batch, self.rows.len(), cols], data)
    }

    fn run_feats(&mut self, xs: &X) -> anyhow::Result<Vec<X>> {
        if !self.with_feats {
            return Err(YmirError::MissingFeatures.into());
        }
        let (b, h, w) = (xs.shape()[0], xs.shape()[2], xs.shape()[3]);
        Ok([8, 16, 32]
            .iter()
            .map(|s| X::from(Array::zeros(IxDyn(&[b, 3, h / s, w / s, 5 + self.nc]))))
            .collect())
    }
}

/// A single-task configuration rooted in `dir`.
pub(crate) fn test_config(dir: &Path, class_names: &[&str]) -> YmirConfig {
    let ymir = YmirEnv {
        task_id: "t0000001".to_string(),
        run_infer: true,
        input: YmirInput {
            root_dir: dir.join("in"),
            assets_dir: dir.join("in/assets"),
            models_dir: dir.join("in/models"),
            candidate_index_file: dir.join("in/candidate-index.tsv"),
            ..Default::default()
        },
        output: YmirOutput {
            root_dir: dir.join("out"),
            monitor_file: dir.join("out/monitor.txt"),
            ..Default::default()
        },
        ..Default::default()
    };
    let param = UserParams::new(class_names, 0.25, 0.45, 640).with_gpu_id("cpu");
    YmirConfig::new(ymir, param)
}
