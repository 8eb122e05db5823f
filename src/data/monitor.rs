use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use crate::common::YmirConfig;

/// Task state the harness reads as "running".
pub const TASK_STATE_RUNNING: u8 = 2;

/// Receives the overall run fraction in `[0, 1]`.
pub trait ProgressMonitor {
    fn write_monitor_logger(&mut self, percent: f32) -> Result<()>;
}

/// Writes progress to the harness monitor file, one line replacing the previous one.
#[derive(Debug, Clone)]
pub struct MonitorFile {
    task_id: String,
    path: PathBuf,
}

impl MonitorFile {
    pub fn new<P: AsRef<Path>>(task_id: &str, path: P) -> Self {
        Self {
            task_id: task_id.to_string(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(cfg: &YmirConfig) -> Self {
        Self::new(&cfg.ymir.task_id, &cfg.ymir.output.monitor_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressMonitor for MonitorFile {
    fn write_monitor_logger(&mut self, percent: f32) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let line = format!(
            "{}\t{:.6}\t{:.2}\t{}\n",
            self.task_id, timestamp, percent, TASK_STATE_RUNNING
        );
        std::fs::write(&self.path, line)
            .with_context(|| format!("failed to write monitor file {}", self.path.display()))
    }
}

/// Discards progress. Used when no monitor file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMonitor;

impl ProgressMonitor for NullMonitor {
    fn write_monitor_logger(&mut self, _percent: f32) -> Result<()> {
        Ok(())
    }
}
