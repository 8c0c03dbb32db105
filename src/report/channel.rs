use tokio::sync::mpsc;

use super::ProgressReporter;

/// A single progress signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    TopLabel(String),
    TopBar(f32),
    BotLabel(String),
    BotBar(f32),
    Canvas(String),
    Error(String),
}

/// Forwards every signal as a `ProgressEvent` through an unbounded channel,
/// so a front end can render them from another task.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    /// Creates a new `ChannelReporter`.
    ///
    /// # Returns
    /// The reporter and the receiving end of its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProgressEvent) {
        // a closed receiver means nobody is watching
        let _ = self.tx.send(event);
    }
}

impl ProgressReporter for ChannelReporter {
    fn signal_top_label(&mut self, text: &str) {
        self.send(ProgressEvent::TopLabel(text.to_string()));
    }

    fn signal_top_bar(&mut self, percent: f32) {
        self.send(ProgressEvent::TopBar(percent));
    }

    fn signal_bot_label(&mut self, text: &str) {
        self.send(ProgressEvent::BotLabel(text.to_string()));
    }

    fn signal_bot_bar(&mut self, percent: f32) {
        self.send(ProgressEvent::BotBar(percent));
    }

    fn signal_canvas(&mut self, text: &str) {
        self.send(ProgressEvent::Canvas(text.to_string()));
    }

    fn signal_error(&mut self, text: &str) {
        self.send(ProgressEvent::Error(text.to_string()));
    }
}
