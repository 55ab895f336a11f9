//! Per-task model handles
//!
//! Each task has at most one predictor, loaded once at startup. A task
//! whose model failed to load stays absent for the life of the process.

use super::{ChecksumMismatch, OnnxPredictor, Predictor};
use crate::error::{PredictionError, PredictionResult};
use crate::models::{FeatureRecord, RawOutput, Task};
use crate::observability::StructuredLogger;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Where to find the artifact for a task
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub task: Task,
    pub path: PathBuf,
    pub expected_sha256: Option<String>,
}

impl ModelSource {
    pub fn new(task: Task, path: impl Into<PathBuf>) -> Self {
        Self {
            task,
            path: path.into(),
            expected_sha256: None,
        }
    }

    pub fn with_checksum(mut self, sha256: impl Into<String>) -> Self {
        self.expected_sha256 = Some(sha256.into());
        self
    }
}

/// Outcome of loading a task's model at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// Not configured, unreadable or not a usable graph
    Missing,
    /// The artifact did not match its configured checksum
    Rejected(String),
}

/// Holds the loaded predictor for each task
#[derive(Clone, Default)]
pub struct ModelInvoker {
    handles: HashMap<Task, Arc<dyn Predictor>>,
    rejected: HashMap<Task, String>,
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("loaded", &self.loaded_tasks())
            .finish()
    }
}

impl ModelInvoker {
    /// An invoker with no models; every task is unavailable
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every source; failures are logged and leave that task absent
    pub fn load(sources: &[ModelSource], logger: &StructuredLogger) -> Self {
        let mut invoker = Self::new();
        for source in sources {
            match OnnxPredictor::from_path(
                &source.path,
                source.task.schema(),
                source.expected_sha256.as_deref(),
            ) {
                Ok(predictor) => {
                    logger.log_model_loaded(source.task, &source.path, predictor.model_version());
                    invoker.insert(source.task, Arc::new(predictor));
                }
                Err(e) => {
                    logger.log_model_load_failed(source.task, &source.path, &format!("{:#}", e));
                    if let Some(mismatch) = e
                        .chain()
                        .find_map(|cause| cause.downcast_ref::<ChecksumMismatch>())
                    {
                        invoker.rejected.insert(source.task, mismatch.to_string());
                    }
                }
            }
        }
        invoker
    }

    pub fn with_predictor(mut self, task: Task, predictor: Arc<dyn Predictor>) -> Self {
        self.insert(task, predictor);
        self
    }

    fn insert(&mut self, task: Task, predictor: Arc<dyn Predictor>) {
        self.handles.insert(task, predictor);
    }

    pub fn is_loaded(&self, task: Task) -> bool {
        self.handles.contains_key(&task)
    }

    pub fn load_status(&self, task: Task) -> LoadStatus {
        if self.is_loaded(task) {
            LoadStatus::Loaded
        } else if let Some(reason) = self.rejected.get(&task) {
            LoadStatus::Rejected(reason.clone())
        } else {
            LoadStatus::Missing
        }
    }

    pub fn loaded_tasks(&self) -> Vec<Task> {
        Task::ALL
            .into_iter()
            .filter(|t| self.is_loaded(*t))
            .collect()
    }

    pub fn model_version(&self, task: Task) -> Option<&str> {
        self.handles.get(&task).map(|p| p.model_version())
    }

    /// Run the task's model on a record
    pub fn predict(&self, task: Task, record: &FeatureRecord) -> PredictionResult<RawOutput> {
        let predictor = self
            .handles
            .get(&task)
            .ok_or(PredictionError::ModelUnavailable(task))?;

        if record.task != task {
            return Err(PredictionError::InferenceFailure(format!(
                "{} record passed to {} model",
                record.task, task
            )));
        }
        record
            .validate()
            .map_err(PredictionError::InferenceFailure)?;

        predictor.predict(record).map_err(PredictionError::inference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;

    struct Constant(RawOutput);

    impl Predictor for Constant {
        fn predict(&self, _record: &FeatureRecord) -> anyhow::Result<RawOutput> {
            Ok(self.0)
        }

        fn model_version(&self) -> &str {
            "constant"
        }
    }

    fn crop_record() -> FeatureRecord {
        let mut record = FeatureRecord::new(Task::Crop);
        for name in Task::Crop.schema().names() {
            record.push(name, FeatureValue::Float(0.5));
        }
        record
    }

    #[test]
    fn test_absent_model_is_unavailable() {
        let invoker = ModelInvoker::new();
        let err = invoker.predict(Task::Crop, &crop_record()).unwrap_err();
        assert!(matches!(err, PredictionError::ModelUnavailable(Task::Crop)));
        assert!(invoker.loaded_tasks().is_empty());
    }

    #[test]
    fn test_present_model_predicts() {
        let invoker =
            ModelInvoker::new().with_predictor(Task::Crop, Arc::new(Constant(RawOutput::Class(4))));
        assert_eq!(
            invoker.predict(Task::Crop, &crop_record()).unwrap(),
            RawOutput::Class(4)
        );
        assert_eq!(invoker.loaded_tasks(), vec![Task::Crop]);
        assert_eq!(invoker.model_version(Task::Crop), Some("constant"));
        assert!(!invoker.is_loaded(Task::Yield));
    }

    #[test]
    fn test_schema_mismatch_rejected_before_invocation() {
        let invoker =
            ModelInvoker::new().with_predictor(Task::Crop, Arc::new(Constant(RawOutput::Class(4))));
        let mut record = crop_record();
        record.fields.reverse();
        assert!(matches!(
            invoker.predict(Task::Crop, &record),
            Err(PredictionError::InferenceFailure(_))
        ));
    }

    #[test]
    fn test_wrong_task_record_rejected() {
        let invoker = ModelInvoker::new()
            .with_predictor(Task::Fertilizer, Arc::new(Constant(RawOutput::Class(1))));
        assert!(matches!(
            invoker.predict(Task::Fertilizer, &crop_record()),
            Err(PredictionError::InferenceFailure(_))
        ));
    }

    #[test]
    fn test_load_failure_leaves_task_absent() {
        let logger = StructuredLogger::new("test");
        let dir = tempfile::tempdir().unwrap();
        let sources = [
            ModelSource::new(Task::Yield, dir.path().join("missing.onnx")),
            ModelSource::new(Task::Crop, dir.path().join("also-missing.onnx")),
        ];
        let invoker = ModelInvoker::load(&sources, &logger);
        assert!(invoker.loaded_tasks().is_empty());
        assert_eq!(invoker.load_status(Task::Yield), LoadStatus::Missing);
        assert_eq!(invoker.load_status(Task::Fertilizer), LoadStatus::Missing);
    }

    #[test]
    fn test_checksum_mismatch_marks_task_rejected() {
        let logger = StructuredLogger::new("test");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop.onnx");
        std::fs::write(&path, b"tampered artifact").unwrap();

        let sources = [ModelSource::new(Task::Crop, &path).with_checksum("00ff")];
        let invoker = ModelInvoker::load(&sources, &logger);

        assert!(!invoker.is_loaded(Task::Crop));
        match invoker.load_status(Task::Crop) {
            LoadStatus::Rejected(reason) => assert!(reason.contains("expected 00ff")),
            other => panic!("expected a rejected model, got {:?}", other),
        }
    }

    #[test]
    fn test_injected_predictor_reports_loaded() {
        let invoker =
            ModelInvoker::new().with_predictor(Task::Yield, Arc::new(Constant(RawOutput::Score(1.0))));
        assert_eq!(invoker.load_status(Task::Yield), LoadStatus::Loaded);
        assert_eq!(invoker.load_status(Task::Crop), LoadStatus::Missing);
    }
}
