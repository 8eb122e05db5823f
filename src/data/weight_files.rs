use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::common::YmirConfig;

pub const WEIGHT_SUFFIX: &str = ".onnx";

/// Candidate weight files: every `model_params_path` entry under `models_dir`
/// that exists and carries `suffix`.
pub fn get_weight_files(cfg: &YmirConfig, suffix: &str) -> Vec<PathBuf> {
    let models_dir = &cfg.ymir.input.models_dir;
    cfg.param
        .model_params_path
        .iter()
        .map(|p| models_dir.join(p))
        .filter(|p| p.is_file() && has_suffix(p, suffix))
        .collect()
}

/// Picks the weight file by priority: `*best<suffix>` first, then the newest file.
pub fn select_weight_file(candidates: &[PathBuf], suffix: &str) -> Option<PathBuf> {
    let best = format!("best{suffix}");
    if let Some(p) = candidates.iter().find(|p| file_name(p).ends_with(&best)) {
        return Some(p.clone());
    }

    // strict comparison keeps the first of equally old files
    let mut newest: Option<(&PathBuf, SystemTime)> = None;
    for p in candidates {
        let created = creation_time(p);
        match newest {
            Some((_, t)) if created <= t => {}
            _ => newest = Some((p, created)),
        }
    }
    newest.map(|(p, _)| p.clone())
}

/// Returns the weight file to load, or `None` when no candidate exists.
pub fn get_weight_file(cfg: &YmirConfig) -> Option<PathBuf> {
    let weight_files = get_weight_files(cfg, WEIGHT_SUFFIX);
    let picked = select_weight_file(&weight_files, WEIGHT_SUFFIX);
    log::debug!("weight candidates {:?}, picked {:?}", weight_files, picked);
    picked
}

fn file_name(p: &Path) -> String {
    p.file_name()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_suffix(p: &Path, suffix: &str) -> bool {
    file_name(p).ends_with(suffix)
}

// Not every filesystem records a birth time.
fn creation_time(p: &Path) -> SystemTime {
    std::fs::metadata(p)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
