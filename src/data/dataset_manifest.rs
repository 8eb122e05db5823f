//! YOLOv5 dataset manifest (`data.yaml`) generated from the ymir index files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::{YmirConfig, DATA_YAML};

/// Fields are declared in key order so the written file is stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub names: BTreeMap<usize, String>,
    pub nc: usize,
    pub path: PathBuf,
    pub test: String,
    pub train: String,
    pub val: String,
}

/// The three canonical splits and the ymir index file each one is fed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn all() -> [Split; 3] {
        [Split::Train, Split::Val, Split::Test]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.tsv", self.name())
    }

    pub fn source<'a>(&self, cfg: &'a YmirConfig) -> &'a Path {
        let input = &cfg.ymir.input;
        match self {
            Split::Train => &input.training_index_file,
            Split::Val => &input.val_index_file,
            Split::Test => &input.candidate_index_file,
        }
    }
}

impl DatasetManifest {
    pub fn new(path: &Path, class_names: &[String]) -> Self {
        Self {
            names: class_names.iter().cloned().enumerate().collect(),
            nc: class_names.len(),
            path: path.to_path_buf(),
            test: Split::Test.file_name(),
            train: Split::Train.file_name(),
            val: Split::Val.file_name(),
        }
    }

    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self> {
        let p = p.as_ref();
        let text = std::fs::read_to_string(p)
            .with_context(|| format!("failed to read dataset manifest {}", p.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid dataset manifest {}", p.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, p: P) -> Result<()> {
        let text = serde_yaml::to_string(self)?;
        std::fs::write(p.as_ref(), text)
            .with_context(|| format!("failed to write dataset manifest {}", p.as_ref().display()))
    }

    pub fn split(&self, split: Split) -> &str {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    /// Class names in index order.
    pub fn class_names(&self) -> Vec<String> {
        self.names.values().cloned().collect()
    }
}

/// Converts the ymir dataset description into a YOLOv5 `data.yaml` and returns its path.
///
/// Each split's index file is copied into the cache directory when it exists; the
/// manifest names the split file either way, so a missing split only fails when a
/// consumer tries to read it.
pub fn convert_ymir_to_yolov5(cfg: &YmirConfig) -> Result<PathBuf> {
    let cache_dir = cfg.cache_dir();
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir {}", cache_dir.display()))?;

    let manifest = DatasetManifest::new(&cache_dir, cfg.class_names());

    for split in Split::all() {
        let src_file = split.source(cfg);
        if src_file.as_os_str().is_empty() || !src_file.is_file() {
            log::warn!("{} index file {:?} not found, skip copy", split.name(), src_file);
            continue;
        }
        let dst_file = cache_dir.join(manifest.split(split));
        std::fs::copy(src_file, &dst_file).with_context(|| {
            format!("failed to copy {} to {}", src_file.display(), dst_file.display())
        })?;
    }

    let data_yaml = cache_dir.join(DATA_YAML);
    manifest.save(&data_yaml)?;
    log::info!("dataset manifest written to {}", data_yaml.display());
    Ok(data_yaml)
}
