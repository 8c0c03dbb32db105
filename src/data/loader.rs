use std::num::NonZeroUsize;

use ndarray::Array3;
use rand::{rngs::StdRng, seq::SliceRandom};

use super::{TrajBatch, TrajDataset};

/// A re-iterable source of batches: every call to `batches` is a new epoch.
pub trait BatchLoader {
    type Batch;

    /// Returns the amount of batches yielded per epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new pass over the data.
    ///
    /// # Returns
    /// An iterator over the epoch's batches.
    fn batches(&mut self) -> Box<dyn Iterator<Item = Self::Batch> + '_>;
}

/// Pre-built batches, replayed in the same order every epoch.
impl<B: Clone> BatchLoader for Vec<B> {
    type Batch = B;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = B> + '_> {
        Box::new(self.iter().cloned())
    }
}

/// Batches a `TrajDataset`, optionally reshuffling it at the start of every epoch.
#[derive(Debug, Clone)]
pub struct TrajLoader {
    dataset: TrajDataset,
    batch_size: NonZeroUsize,
    order: Vec<usize>,
    rng: Option<StdRng>,
}

impl TrajLoader {
    /// Creates a new sequential `TrajLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The dataset to batch.
    /// * `batch_size` - The maximum amount of samples per batch, the last one may be smaller.
    ///
    /// # Returns
    /// A new `TrajLoader` instance.
    pub fn new(dataset: TrajDataset, batch_size: NonZeroUsize) -> Self {
        Self {
            order: (0..dataset.len()).collect(),
            dataset,
            batch_size,
            rng: None,
        }
    }

    /// Makes the loader shuffle the samples before each epoch.
    ///
    /// # Arguments
    /// * `rng` - The random number generator driving the permutations.
    pub fn shuffled(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    #[inline]
    pub fn dataset(&self) -> &TrajDataset {
        &self.dataset
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }
}

impl BatchLoader for TrajLoader {
    type Batch = TrajBatch<Array3<f32>>;

    fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size.get())
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Self::Batch> + '_> {
        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }

        let Self {
            dataset,
            batch_size,
            order,
            ..
        } = &*self;

        Box::new(
            order
                .chunks(batch_size.get())
                .map(move |indices| dataset.collate(indices)),
        )
    }
}
