//! ONNX Runtime backend for YOLOv5 exports.

use std::path::Path;

use anyhow::Result;
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
                          ExecutionProviderDispatch, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    tensor::TensorElementType,
    value::{DynValue, Tensor, ValueType},
};
use regex::Regex;

use crate::common::{ComputeDevice, InferenceDevice, YmirError};
use crate::data::X;
use crate::detection_runners::inference_process::DetectionBackend;

/// YOLOv5 P5 models downsample by 32 at the coarsest level.
pub const DEFAULT_STRIDE: u32 = 32;

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    input_name: String,
    input_dtype: TensorElementType,
    output_names: Vec<String>,
    stride: u32,
    names: Option<Vec<String>>,
}

impl OrtEngine {
    pub fn new<P: AsRef<Path>>(weights: P, device: &ComputeDevice, ort_lib_path: Option<&str>) -> Result<Self> {
        let weights = weights.as_ref();

        if let Some(lib_path) = ort_lib_path.filter(|p| !p.is_empty()) {
            match ort::init_from(lib_path).commit() {
                Ok(_) => {}
                Err(e) => {
                    return Err(anyhow::anyhow!("Failed to commit ORT from {}: {:?}", lib_path, e));
                }
            };
        }

        let inference_device = device.device();
        let session = Session::builder()?
            .with_execution_providers(Self::execution_providers(inference_device))?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(weights)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("Model {} has no inputs", weights.display()))?;
        let input_name = input.name.clone();
        let input_dtype = match &input.input_type {
            ValueType::Tensor { ty, .. } => *ty,
            other => anyhow::bail!("Unsupported model input type: {:?}", other),
        };
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        let stride = Self::try_fetch(&session, "stride")
            .and_then(|s| s.trim().parse::<f32>().ok())
            .map(|s| s as u32)
            .unwrap_or(DEFAULT_STRIDE);
        let names = Self::try_fetch(&session, "names").map(|names| Self::parse_names(&names));

        log::info!(
            "Backend: ONNXRuntime | Weights: {} | Device: {} {:?} | Input: {} {:?} | Outputs: {:?} | Stride: {}",
            weights.display(),
            inference_device.str(),
            device.device_ids(),
            input_name,
            input_dtype,
            output_names,
            stride,
        );

        Ok(Self {
            session,
            device: inference_device,
            input_name,
            input_dtype,
            output_names,
            stride,
            names,
        })
    }

    /// Providers in priority order. ORT falls back to the CPU when one is unavailable.
    fn execution_providers(device: InferenceDevice) -> Vec<ExecutionProviderDispatch> {
        match device {
            InferenceDevice::TensorRT(device_id) => vec![
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id as i32)
                    .with_engine_cache(true)
                    .with_engine_cache_path("trt-cache")
                    .build(),
                CUDAExecutionProvider::default().with_device_id(device_id as i32).build(),
            ],
            InferenceDevice::CUDA(device_id) => vec![
                CUDAExecutionProvider::default().with_device_id(device_id as i32).build(),
            ],
            InferenceDevice::CoreML(_) => vec![CoreMLExecutionProvider::default().build()],
            InferenceDevice::CPU => vec![CPUExecutionProvider::default().build()],
        }
    }

    fn try_fetch(session: &Session, key: &str) -> Option<String> {
        match session.metadata() {
            Err(_) => None,
            Ok(metadata) => metadata.custom(key).unwrap_or_default(),
        }
    }

    /// Parses export metadata such as `{0: 'person', 1: 'bicycle', 2: "yellow_lady's_slipper"}`.
    pub fn parse_names(names: &str) -> Vec<String> {
        let re = match Regex::new(r#"(['"])([-()\w '"]+)(['"])"#) {
            Ok(re) => re,
            Err(_) => return vec![],
        };
        re.captures_iter(names)
            .map(|x| x.extract::<3>().1[1].to_string())
            .collect()
    }

    fn tensor_preprocess(x: &X, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Tensor::from_array(x.0.clone())?.into_dyn(),
            TensorElementType::Float16 => Tensor::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Tensor::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            TensorElementType::Float64 => Tensor::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            _ => anyhow::bail!("Unsupported model input dtype: {:?}", dtype),
        };
        Ok(x)
    }

    fn tensor_postprocess(x: &DynValue) -> Result<Array<f32, IxDyn>> {
        if let Ok(y) = x.try_extract_array::<f32>() {
            return Ok(y.view().into_owned());
        }
        if let Ok(y) = x.try_extract_array::<f16>() {
            return Ok(y.view().mapv(f16::to_f32));
        }
        if let Ok(y) = x.try_extract_array::<bf16>() {
            return Ok(y.view().mapv(bf16::to_f32));
        }
        let y = x.try_extract_array::<f64>()?;
        Ok(y.view().mapv(|v| v as f32))
    }

    fn engine_run(&mut self, xs: &X) -> Result<Vec<X>> {
        let input = Self::tensor_preprocess(xs, &self.input_dtype)?;
        let outputs = self.session.run(ort::inputs![self.input_name.as_str() => input])?;

        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in self.output_names.iter() {
            let y = outputs
                .get(name.as_str())
                .ok_or_else(|| anyhow::anyhow!("Output '{}' not found", name))?;
            ys.push(X::from(Self::tensor_postprocess(y)?));
        }
        Ok(ys)
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn in_name(&self) -> &str {
        &self.input_name
    }

    pub fn out_names(&self) -> &[String] {
        &self.output_names
    }
}

impl DetectionBackend for OrtEngine {
    fn stride(&self) -> u32 {
        self.stride
    }

    fn names(&self) -> Option<Vec<String>> {
        self.names.clone()
    }

    fn run(&mut self, xs: &X) -> Result<X> {
        let mut ys = self.engine_run(xs)?;
        if ys.is_empty() {
            anyhow::bail!("Model produced no outputs");
        }
        Ok(ys.swap_remove(0))
    }

    fn run_feats(&mut self, xs: &X) -> Result<Vec<X>> {
        let ys = self.engine_run(xs)?;
        if ys.len() < 2 {
            return Err(YmirError::MissingFeatures.into());
        }
        Ok(ys.into_iter().skip(1).collect())
    }
}
