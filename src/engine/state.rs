/// The counters of a run, as seen by the process function and the event handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineState {
    /// The current epoch, 1-based. Zero before the first epoch starts.
    pub epoch: usize,
    /// The global iteration, 1-based and never reset between epochs.
    pub iteration: usize,
    pub max_epochs: usize,
    /// The amount of batches per epoch.
    pub epoch_length: usize,
    /// The output of the last processed batch.
    pub output: Option<f32>,
}

impl EngineState {
    pub fn new(max_epochs: usize, epoch_length: usize) -> Self {
        Self {
            max_epochs,
            epoch_length,
            ..Default::default()
        }
    }
}
