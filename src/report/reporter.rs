/// The progress display a training run reports to.
///
/// It has two labelled progress bars, the top one for iterations and the
/// bottom one for epochs, a free text canvas, and an error line.
pub trait ProgressReporter {
    fn signal_top_label(&mut self, text: &str);

    /// # Arguments
    /// * `percent` - The completion of the current epoch, from 0 to 100.
    fn signal_top_bar(&mut self, percent: f32);

    fn signal_bot_label(&mut self, text: &str);

    /// # Arguments
    /// * `percent` - The completion of the run, from 0 to 100.
    fn signal_bot_bar(&mut self, percent: f32);

    /// Appends text to the canvas.
    fn signal_canvas(&mut self, text: &str);

    fn signal_error(&mut self, text: &str);
}
