mod channel;
mod reporter;

pub use channel::{ChannelReporter, ProgressEvent};
pub use reporter::ProgressReporter;
