//! Harness configuration: the ymir `env.yaml` plus the user `config.yaml`.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

pub const DATA_YAML: &str = "data.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct YmirConfig {
    pub ymir: YmirEnv,
    pub param: UserParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YmirEnv {
    pub task_id: String,
    pub protocol_version: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub run_training: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub run_mining: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub run_infer: bool,
    pub input: YmirInput,
    pub output: YmirOutput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YmirInput {
    pub root_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub annotations_dir: PathBuf,
    pub models_dir: PathBuf,
    pub training_index_file: PathBuf,
    pub val_index_file: PathBuf,
    pub candidate_index_file: PathBuf,
    pub config_file: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YmirOutput {
    pub root_dir: PathBuf,
    pub models_dir: PathBuf,
    pub tensorboard_dir: PathBuf,
    pub training_result_file: PathBuf,
    pub mining_result_file: PathBuf,
    pub infer_result_file: PathBuf,
    pub monitor_file: PathBuf,
}

/// User hyper-parameters. Scalars may arrive quoted (`"0.25"`), so every numeric
/// and boolean field is parsed leniently.
#[derive(Debug, Clone, Deserialize)]
pub struct UserParams {
    #[serde(default = "default_gpu_id", deserialize_with = "lenient")]
    pub gpu_id: String,
    #[serde(default = "default_per_gpu", deserialize_with = "lenient")]
    pub batch_size_per_gpu: usize,
    #[serde(default = "default_per_gpu", deserialize_with = "lenient")]
    pub num_workers_per_gpu: usize,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub pin_memory: bool,
    #[serde(deserialize_with = "lenient")]
    pub conf_thres: f32,
    #[serde(deserialize_with = "lenient")]
    pub iou_thres: f32,
    #[serde(deserialize_with = "lenient")]
    pub img_size: u32,
    pub class_names: Vec<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub model_params_path: Vec<String>,
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub agnostic_nms: bool,
    #[serde(default)]
    pub ort_lib_path: Option<String>,
}

fn default_gpu_id() -> String {
    "0".to_string()
}

fn default_per_gpu() -> usize {
    4
}

fn default_execution_provider() -> String {
    "cuda".to_string()
}

fn default_true() -> bool {
    true
}

fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    let text = scalar_text(value).ok_or_else(|| D::Error::custom("expected a scalar value"))?;
    text.trim().parse::<T>().map_err(D::Error::custom)
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::Null => Ok(false),
        value => {
            let text = scalar_text(value).ok_or_else(|| D::Error::custom("expected a boolean"))?;
            Ok(matches!(text.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "y" | "on"))
        }
    }
}

impl UserParams {
    pub fn new(class_names: &[&str], conf_thres: f32, iou_thres: f32, img_size: u32) -> Self {
        Self {
            gpu_id: default_gpu_id(),
            batch_size_per_gpu: default_per_gpu(),
            num_workers_per_gpu: default_per_gpu(),
            pin_memory: false,
            conf_thres,
            iou_thres,
            img_size,
            class_names: class_names.iter().map(|x| x.to_string()).collect(),
            cache_dir: None,
            model_params_path: vec![],
            execution_provider: default_execution_provider(),
            agnostic_nms: true,
            ort_lib_path: None,
        }
    }

    pub fn with_gpu_id(mut self, gpu_id: &str) -> Self {
        self.gpu_id = gpu_id.to_string();
        self
    }

    pub fn with_batch_size_per_gpu(mut self, n: usize) -> Self {
        self.batch_size_per_gpu = n;
        self
    }

    pub fn with_cache_dir<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().to_path_buf());
        self
    }

    pub fn with_model_params_path(mut self, files: &[&str]) -> Self {
        self.model_params_path = files.iter().map(|x| x.to_string()).collect();
        self
    }

    pub fn with_execution_provider(mut self, provider: &str) -> Self {
        self.execution_provider = provider.to_string();
        self
    }

    pub fn with_agnostic_nms(mut self, x: bool) -> Self {
        self.agnostic_nms = x;
        self
    }
}

impl YmirConfig {
    pub fn new(ymir: YmirEnv, param: UserParams) -> Self {
        Self { ymir, param }
    }

    /// Loads the harness environment file and the user parameter file.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(env_file: P, config_file: Q) -> Result<Self> {
        let env_file = env_file.as_ref();
        let config_file = config_file.as_ref();
        let env = std::fs::read_to_string(env_file)
            .with_context(|| format!("failed to read ymir env file {}", env_file.display()))?;
        let params = std::fs::read_to_string(config_file)
            .with_context(|| format!("failed to read ymir config file {}", config_file.display()))?;
        Self::from_yaml_strs(&env, &params)
    }

    pub fn from_yaml_strs(env: &str, params: &str) -> Result<Self> {
        let ymir: YmirEnv = serde_yaml::from_str(env).context("invalid ymir env yaml")?;
        let param: UserParams = serde_yaml::from_str(params).context("invalid ymir config yaml")?;
        Ok(Self { ymir, param })
    }

    /// Directory holding the dataset manifest and the copied split files.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.param.cache_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => self.ymir.output.root_dir.clone(),
        }
    }

    pub fn data_yaml(&self) -> PathBuf {
        self.cache_dir().join(DATA_YAML)
    }

    pub fn class_names(&self) -> &[String] {
        &self.param.class_names
    }

    pub fn to_string(&self) -> String {
        format!("Task Id: {}\n\
        Run Mining: {} | Run Infer: {}\n\
        Models Dir: {}\n\
        Weight Candidates: {:?}\n\
        GPU Id: {} ({})\n\
        Image Size: {}\n\
        Thresholds: conf={} iou={}\n\
        Classes: {:?}",
                self.ymir.task_id, self.ymir.run_mining, self.ymir.run_infer,
                self.ymir.input.models_dir.display(), self.param.model_params_path,
                self.param.gpu_id, self.param.execution_provider, self.param.img_size,
                self.param.conf_thres, self.param.iou_thres, self.param.class_names)
    }
}
