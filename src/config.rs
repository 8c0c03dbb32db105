use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{EngineErr, Result};

const DEFAULT_SAVE_DIR: &str = "model/Prediction/trained_models/";
const DEFAULT_LEARNING_RATE: f32 = 0.001;

/// The hyperparameters of a training run.
///
/// Read-only once the engine is built. The loss kinds are kept as the raw
/// configured strings, an unknown value is only detected (and recovered from)
/// when a batch is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(alias = "pretrainEpochs")]
    pub pretrain_epochs: usize,
    #[serde(alias = "trainEpochs")]
    pub train_epochs: usize,
    pub batch_size: NonZeroUsize,
    #[serde(default)]
    pub cuda: bool,
    #[serde(rename = "eval", default)]
    pub eval_only: bool,
    pub name: String,
    #[serde(default = "default_pretrain_loss")]
    pub pretrain_loss: String,
    #[serde(default = "default_train_loss")]
    pub train_loss: String,
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
}

fn default_pretrain_loss() -> String {
    "MSE".into()
}

fn default_train_loss() -> String {
    "NLL".into()
}

fn default_save_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SAVE_DIR)
}

fn default_learning_rate() -> f32 {
    DEFAULT_LEARNING_RATE
}

impl EngineConfig {
    /// Creates a new `EngineConfig` with the default loss kinds, save directory and learning rate.
    ///
    /// # Arguments
    /// * `name` - The run name, the weights file is named after it.
    /// * `pretrain_epochs` - Epochs numbered below it are trained with the pretrain loss.
    /// * `train_epochs` - The amount of epochs trained with the main loss.
    /// * `batch_size` - The amount of samples per batch.
    ///
    /// # Returns
    /// A new `EngineConfig` instance.
    pub fn new(
        name: impl Into<String>,
        pretrain_epochs: usize,
        train_epochs: usize,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            pretrain_epochs,
            train_epochs,
            batch_size,
            cuda: false,
            eval_only: false,
            name: name.into(),
            pretrain_loss: default_pretrain_loss(),
            train_loss: default_train_loss(),
            save_dir: default_save_dir(),
            seed: None,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }

    /// Parses and validates a configuration from a JSON string.
    ///
    /// # Arguments
    /// * `json` - The JSON document.
    ///
    /// # Returns
    /// The parsed configuration or an error if it's malformed or invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The path to the JSON file.
    ///
    /// # Returns
    /// The parsed configuration or an error if it can't be read or is invalid.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Checks the invariants serde can't express.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineErr::InvalidConfig("name must not be empty".into()));
        }

        if self.name.contains(['/', '\\']) {
            return Err(EngineErr::InvalidConfig(format!(
                "name ({}) must not contain path separators",
                self.name
            )));
        }

        if !self.eval_only && self.max_epochs() == 0 {
            return Err(EngineErr::InvalidConfig(
                "pretrainEpochs + trainEpochs must be greater than 0".into(),
            ));
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(EngineErr::InvalidConfig(format!(
                "learning_rate ({}) must be a positive number",
                self.learning_rate
            )));
        }

        Ok(())
    }

    /// Returns the total amount of epochs of a training run.
    pub fn max_epochs(&self) -> usize {
        self.pretrain_epochs + self.train_epochs
    }

    /// Returns the path the trained weights are persisted to.
    pub fn weights_path(&self) -> PathBuf {
        self.save_dir.join(&self.name)
    }
}
