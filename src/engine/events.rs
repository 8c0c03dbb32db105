/// The points of a run handlers can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Once, before the first epoch.
    Started,
    EpochStarted,
    /// After every processed batch.
    IterationCompleted,
    EpochCompleted,
    /// Once, after the last epoch.
    Completed,
}
