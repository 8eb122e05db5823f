use crate::common::YmirError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InferenceDevice {
    #[default] CPU,
    CUDA(usize),
    TensorRT(usize),
    CoreML(usize),
}

impl InferenceDevice {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "cpu" => Some(InferenceDevice::CPU),
            "cuda" => Some(InferenceDevice::CUDA(device_id)),
            "tensorrt" => Some(InferenceDevice::TensorRT(device_id)),
            "coreml" => Some(InferenceDevice::CoreML(device_id)),
            _ => None,
        }
    }

    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => "CPU",
            InferenceDevice::CUDA(_) => "CUDA",
            InferenceDevice::TensorRT(_) => "TensorRT",
            InferenceDevice::CoreML(_) => "CoreML",
        }
    }
}

/// Explicit compute device handle handed to the detector.
///
/// Built from the harness `gpu_id` parameter (`"0"`, `"0,1"`, `"cpu"` or empty).
/// The session runs on the first listed id; the remaining ids only scale the
/// effective batch size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeDevice {
    device: InferenceDevice,
    device_ids: Vec<usize>,
}

impl Default for ComputeDevice {
    fn default() -> Self {
        Self::cpu()
    }
}

impl ComputeDevice {
    pub fn cpu() -> Self {
        Self {
            device: InferenceDevice::CPU,
            device_ids: vec![],
        }
    }

    /// Parses a `gpu_id` string for the given execution provider name.
    pub fn from_gpu_id(gpu_id: &str, provider: &str) -> Result<Self, YmirError> {
        let gpu_id = gpu_id.trim();
        if gpu_id.is_empty() || gpu_id.eq_ignore_ascii_case("cpu") {
            return Ok(Self::cpu());
        }

        let device_ids = gpu_id
            .split(',')
            .map(|id| id.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| YmirError::InvalidDevice(gpu_id.to_string()))?;

        let device = InferenceDevice::from_str(provider, device_ids[0])
            .ok_or_else(|| YmirError::InvalidDevice(provider.to_string()))?;

        if device == InferenceDevice::CPU {
            return Ok(Self::cpu());
        }

        Ok(Self { device, device_ids })
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn device_ids(&self) -> &[usize] {
        &self.device_ids
    }

    /// Number of devices the batch is spread over. A CPU handle counts as one.
    pub fn device_count(&self) -> usize {
        self.device_ids.len().max(1)
    }
}
