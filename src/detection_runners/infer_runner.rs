use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::common::{Annotation, YmirConfig, YmirStage};
use crate::detection_runners::inference_process::DetectionBackend;
use crate::detection_runners::ymir_yolov5::YmirYolov5;
use crate::utils;

/// Annotations per asset path.
pub type InferResult = BTreeMap<String, Vec<Annotation>>;

/// Where finished inference results go. The on-disk format belongs to the harness.
pub trait ResultSink {
    fn write_infer_result(&mut self, infer_result: &InferResult) -> Result<()>;
}

/// Asset paths listed in an index file: the first tab separated field of each line.
pub fn read_index_file<P: AsRef<Path>>(index_file: P, assets_dir: &Path) -> Result<Vec<PathBuf>> {
    let index_file = index_file.as_ref();
    let lines = utils::file_to_vec(index_file)
        .with_context(|| format!("failed to read index file {}", index_file.display()))?;

    Ok(lines
        .iter()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let p = PathBuf::from(p);
            if p.is_relative() && !assets_dir.as_os_str().is_empty() {
                assets_dir.join(p)
            } else {
                p
            }
        })
        .collect())
}

/// Runs inference over the candidate index and hands the results to `sink`.
///
/// Returns the number of processed images.
pub fn run_infer<B, S>(detector: &mut YmirYolov5<B>, cfg: &YmirConfig, sink: &mut S) -> Result<usize>
where
    B: DetectionBackend,
    S: ResultSink,
{
    let images = read_index_file(&cfg.ymir.input.candidate_index_file, &cfg.ymir.input.assets_dir)?;
    let n = images.len();
    let monitor_gap = (n / 100).max(1);
    log::info!("running inference on {} images", n);

    let mut infer_result = InferResult::new();
    for (idx, asset_path) in images.iter().enumerate() {
        let img = image::open(asset_path)
            .with_context(|| format!("failed to open image {}", asset_path.display()))?
            .to_rgb8();
        let anns = detector.infer(&img)?;
        log::debug!("{}: {} objects", asset_path.display(), anns.len());
        infer_result.insert(asset_path.to_string_lossy().into_owned(), anns);

        if idx % monitor_gap == 0 {
            detector.write_monitor_logger(YmirStage::Task, idx as f32 / n as f32)?;
        }
    }

    sink.write_infer_result(&infer_result)?;
    detector.write_monitor_logger(YmirStage::Postprocess, 1.0)?;
    Ok(n)
}
