//! ClassifierService: owns the live Naive Bayes model and its file on disk.
//!
//! The model is held behind an `RwLock` so predictions run concurrently while
//! a retrain swaps in a new model. Every successful training run is written to
//! `<model_dir>/naive_bayes_model.json` (temp file + rename) and reloaded at
//! startup.

use crate::{
    classifier::{self, ClassifierError, Trained, gaussian_nb::GaussianNb},
    errors::{ServiceError, ServiceResult},
    models::{
        damage_record::{DamageFeatures, DamageLevel, FEATURE_COUNT, FEATURE_NAMES},
        model_metrics::{ModelInfo, ModelStatus},
        prediction::Probabilities,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{fs, sync::RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MODEL_FILE_NAME: &str = "naive_bayes_model.json";
const STORAGE_CHECK_FILE_NAME: &str = ".storage-check";

/// The persisted form of a trained model.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredModel {
    model: GaussianNb,
    trained_at: DateTime<Utc>,
    training_samples: usize,
}

/// A single classification.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub level: DamageLevel,
    pub confidence: f64,
    pub probabilities: Probabilities,
}

pub struct ClassifierService {
    model_dir: PathBuf,
    current: RwLock<Option<StoredModel>>,
}

impl ClassifierService {
    /// A service with no model loaded.
    pub fn untrained(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            current: RwLock::new(None),
        }
    }

    /// Load the persisted model from `model_dir` if there is one.
    ///
    /// A missing file leaves the service untrained. An unreadable or corrupt
    /// file is logged and also leaves it untrained.
    pub async fn load(model_dir: impl Into<PathBuf>) -> Self {
        let service = Self::untrained(model_dir);
        let path = service.model_path();
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StoredModel>(&bytes) {
                Ok(stored) => {
                    info!(
                        "Model loaded from {} (trained at {})",
                        path.display(),
                        stored.trained_at
                    );
                    *service.current.write().await = Some(stored);
                }
                Err(err) => error!("Failed to load model from {}: {}", path.display(), err),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No persisted model at {}", path.display());
            }
            Err(err) => error!("Failed to read model file {}: {}", path.display(), err),
        }
        service
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    fn model_path(&self) -> PathBuf {
        self.model_dir.join(MODEL_FILE_NAME)
    }

    pub async fn is_trained(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Fit a new model, persist it, and make it the live model.
    pub async fn train(
        &self,
        samples: &[[f64; FEATURE_COUNT]],
        labels: &[DamageLevel],
        test_size: f64,
    ) -> ServiceResult<Trained> {
        info!("Starting model training with {} samples", samples.len());
        let trained = classifier::train(samples, labels, test_size)?;

        let stored = StoredModel {
            model: trained.model.clone(),
            trained_at: Utc::now(),
            training_samples: trained.training_samples,
        };

        let mut current = self.current.write().await;
        self.persist(&stored).await?;
        *current = Some(stored);

        info!(
            "Model training completed. Accuracy: {:.4}",
            trained.evaluation.accuracy
        );
        Ok(trained)
    }

    async fn persist(&self, stored: &StoredModel) -> ServiceResult<()> {
        let path = self.model_path();
        let bytes = serde_json::to_vec_pretty(stored)?;
        if let Err(err) = write_atomically(&self.model_dir, &path, &bytes).await {
            error!("Failed to save model to {}: {}", path.display(), err);
            return Err(ServiceError::Io(err));
        }
        info!("Model saved to {}", path.display());
        Ok(())
    }

    /// Write and remove a marker file through the same path `persist` uses.
    pub async fn check_model_dir(&self) -> io::Result<()> {
        let marker = self.model_dir.join(STORAGE_CHECK_FILE_NAME);
        write_atomically(&self.model_dir, &marker, b"ok").await?;
        fs::remove_file(&marker).await
    }

    pub async fn predict(&self, features: &DamageFeatures) -> ServiceResult<Classification> {
        let guard = self.current.read().await;
        let stored = guard.as_ref().ok_or(ServiceError::ModelNotTrained)?;

        let x = features.to_vector();
        let (Some(proba), Some((level, confidence))) =
            (stored.model.predict_proba(&x), stored.model.predict(&x))
        else {
            warn!("No finite posterior for features {:?}", x);
            return Err(ServiceError::Validation(
                ClassifierError::Unclassifiable.to_string(),
            ));
        };
        let mut probabilities = Probabilities::default();
        for (level, p) in proba {
            probabilities.set(level, p);
        }
        debug!("Prediction: {} (confidence: {:.4})", level, confidence);

        Ok(Classification {
            level,
            confidence,
            probabilities,
        })
    }

    /// Training state without accuracy; metrics live in the database.
    pub async fn status(&self) -> ModelStatus {
        match self.current.read().await.as_ref() {
            Some(stored) => ModelStatus {
                is_trained: true,
                training_samples: Some(stored.training_samples),
                last_trained_at: Some(stored.trained_at),
                accuracy: None,
            },
            None => ModelStatus::default(),
        }
    }

    pub async fn model_info(&self) -> ServiceResult<ModelInfo> {
        let guard = self.current.read().await;
        let Some(stored) = guard.as_ref() else {
            warn!("Model info requested before training");
            return Err(ServiceError::BadRequest("Model is not trained yet".into()));
        };
        let model = &stored.model;
        Ok(ModelInfo {
            class_count: model.classes.len(),
            classes: model.classes.iter().map(|c| c.as_str().to_string()).collect(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            class_prior: model.class_prior.clone(),
            theta: model.theta.iter().map(|row| row.to_vec()).collect(),
            var: model.var.iter().map(|row| row.to_vec()).collect(),
        })
    }
}

/// Write `bytes` to a temp file in `dir`, then rename it over `path`.
async fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir).await?;
    let tmp_path = dir.join(format!(".tmp-{}", Uuid::new_v4()));
    let result = match fs::write(&tmp_path, bytes).await {
        Ok(()) => fs::rename(&tmp_path, path).await,
        Err(err) => Err(err),
    };
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}
