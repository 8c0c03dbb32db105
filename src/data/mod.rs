mod batch;
mod dataset;
mod loader;

pub use batch::TrajBatch;
pub use dataset::{Track, TrajDataset};
pub use loader::{BatchLoader, TrajLoader};
