use std::str::FromStr;
use crate::common::YmirError;

const PREPROCESS_PERCENT: f32 = 0.1;
const TASK_PERCENT: f32 = 0.8;
const POSTPROCESS_PERCENT: f32 = 0.1;

/// The logical stage a detector instance is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Mining,
    Infer,
}

impl FromStr for Task {
    type Err = YmirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mining" => Ok(Task::Mining),
            "infer" => Ok(Task::Infer),
            _ => Err(YmirError::UnknownTask(s.to_string())),
        }
    }
}

/// How many logical stages share one harness invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPlan {
    Single,
    /// Mining runs first, inference second.
    MiningThenInfer,
}

impl TaskPlan {
    pub fn from_flags(run_mining: bool, run_infer: bool) -> Self {
        if run_mining && run_infer {
            TaskPlan::MiningThenInfer
        } else {
            TaskPlan::Single
        }
    }

    pub fn slot(&self, task: Task) -> TaskSlot {
        match (self, task) {
            (TaskPlan::Single, _) => TaskSlot { index: 0, total: 1 },
            (TaskPlan::MiningThenInfer, Task::Mining) => TaskSlot { index: 0, total: 2 },
            (TaskPlan::MiningThenInfer, Task::Infer) => TaskSlot { index: 1, total: 2 },
        }
    }
}

/// Position of the current task within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSlot {
    pub index: usize,
    pub total: usize,
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self { index: 0, total: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YmirStage {
    Preprocess,
    Task,
    Postprocess,
}

/// Maps progress `p` within one stage of one task to the overall run fraction.
///
/// Each task owns `1 / total` of the run and splits it 10% / 80% / 10% between
/// preprocess, task and postprocess.
pub fn get_ymir_process(stage: YmirStage, p: f32, slot: TaskSlot) -> Result<f32, YmirError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(YmirError::ProgressOutOfRange(p));
    }

    let total = slot.total.max(1) as f32;
    let ratio = 1.0 / total;
    let init = slot.index as f32 / total;

    let within = match stage {
        YmirStage::Preprocess => PREPROCESS_PERCENT * p,
        YmirStage::Task => PREPROCESS_PERCENT + TASK_PERCENT * p,
        YmirStage::Postprocess => PREPROCESS_PERCENT + TASK_PERCENT + POSTPROCESS_PERCENT * p,
    };

    Ok(init + within * ratio)
}
