use std::{fs, path::Path};

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use super::TrajBatch;
use crate::{EngineErr, Result};

/// A single agent track: the observed history and the future to predict.
///
/// Futures may be shorter than the dataset's horizon, the missing positions
/// are padded and masked out when collating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub hist: Vec<[f32; 2]>,
    pub fut: Vec<[f32; 2]>,
}

/// The on-disk layout of a dataset.
#[derive(Debug, Serialize, Deserialize)]
struct DatasetFile {
    hist_len: usize,
    fut_len: usize,
    tracks: Vec<Track>,
}

/// An in-memory trajectory dataset.
#[derive(Debug, Clone)]
pub struct TrajDataset {
    hist_len: usize,
    fut_len: usize,
    tracks: Vec<Track>,
}

impl TrajDataset {
    /// Creates a new `TrajDataset`.
    ///
    /// # Arguments
    /// * `hist_len` - The amount of observed positions per track.
    /// * `fut_len` - The prediction horizon.
    /// * `tracks` - The samples.
    ///
    /// # Returns
    /// A new dataset or an error if a track doesn't fit the given lengths.
    pub fn new(hist_len: usize, fut_len: usize, tracks: Vec<Track>) -> Result<Self> {
        if hist_len == 0 || fut_len == 0 {
            return Err(EngineErr::InvalidConfig(
                "hist_len and fut_len must be greater than 0".into(),
            ));
        }

        for track in &tracks {
            if track.hist.len() != hist_len {
                return Err(EngineErr::SizeMismatch {
                    what: "track history",
                    got: track.hist.len(),
                    expected: hist_len,
                });
            }

            if track.fut.is_empty() || track.fut.len() > fut_len {
                return Err(EngineErr::SizeMismatch {
                    what: "track future",
                    got: track.fut.len(),
                    expected: fut_len,
                });
            }
        }

        Ok(Self {
            hist_len,
            fut_len,
            tracks,
        })
    }

    /// Reads a dataset from a JSON file holding `hist_len`, `fut_len` and `tracks`.
    ///
    /// # Arguments
    /// * `path` - The path to the JSON file.
    ///
    /// # Returns
    /// The dataset or an error if the file can't be read or is invalid.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: DatasetFile = serde_json::from_str(&content)?;
        Self::new(file.hist_len, file.fut_len, file.tracks)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn hist_len(&self) -> usize {
        self.hist_len
    }

    #[inline]
    pub fn fut_len(&self) -> usize {
        self.fut_len
    }

    /// Stacks the given samples into a time-major batch.
    ///
    /// # Arguments
    /// * `indices` - The indices of the tracks to collate.
    ///
    /// # Returns
    /// A batch whose inputs are the histories, shaped `[hist_len, batch, 2]`.
    ///
    /// # Panics
    /// If an index is out of bounds.
    pub fn collate(&self, indices: &[usize]) -> TrajBatch<Array3<f32>> {
        let n = indices.len();
        let mut hist = Array3::zeros((self.hist_len, n, 2));
        let mut fut = Array3::zeros((self.fut_len, n, 2));
        let mut op_mask = Array3::zeros((self.fut_len, n, 2));

        for (b, &idx) in indices.iter().enumerate() {
            let track = &self.tracks[idx];

            for (t, [x, y]) in track.hist.iter().enumerate() {
                hist[[t, b, 0]] = *x;
                hist[[t, b, 1]] = *y;
            }

            for (t, [x, y]) in track.fut.iter().enumerate() {
                fut[[t, b, 0]] = *x;
                fut[[t, b, 1]] = *y;
                op_mask[[t, b, 0]] = 1.0;
                op_mask[[t, b, 1]] = 1.0;
            }
        }

        TrajBatch {
            inputs: hist,
            fut,
            op_mask,
        }
    }
}
