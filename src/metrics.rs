/// The running losses of a training run.
///
/// The averages are incremental means over the batches seen since their last
/// reset. Both batch counters start at one, which is the value they're reset to.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningMetrics {
    pub total_train_loss: f64,
    pub avg_train_loss: f32,
    pub total_val_loss: f64,
    pub avg_val_loss: f32,

    train_batch_count: usize,
    val_batch_count: usize,
}

impl Default for RunningMetrics {
    fn default() -> Self {
        Self {
            total_train_loss: 0.0,
            avg_train_loss: 0.0,
            total_val_loss: 0.0,
            avg_val_loss: 0.0,
            train_batch_count: 1,
            val_batch_count: 1,
        }
    }
}

impl RunningMetrics {
    /// Accumulates the loss of a training batch.
    pub fn record_train(&mut self, loss: f32) {
        self.total_train_loss += loss as f64;
        self.avg_train_loss += (loss - self.avg_train_loss) / self.train_batch_count as f32;
        self.train_batch_count += 1;
    }

    /// Accumulates the loss of a validation batch.
    pub fn record_val(&mut self, loss: f32) {
        self.total_val_loss += loss as f64;
        self.avg_val_loss += (loss - self.avg_val_loss) / self.val_batch_count as f32;
        self.val_batch_count += 1;
    }

    /// Zeros out the train loss average, the next batch starts a new one.
    pub fn zero_train_loss(&mut self) {
        self.avg_train_loss = 0.0;
        self.train_batch_count = 1;
    }

    /// Zeros out the validation loss average.
    pub fn zero_val_loss(&mut self) {
        self.avg_val_loss = 0.0;
    }

    /// Sets the validation batch counter back to one.
    pub fn reset_val_counter(&mut self) {
        self.val_batch_count = 1;
    }

    #[inline]
    pub fn train_batch_count(&self) -> usize {
        self.train_batch_count
    }

    #[inline]
    pub fn val_batch_count(&self) -> usize {
        self.val_batch_count
    }
}
