use log::debug;

use super::{EngineState, Event};
use crate::{Result, data::BatchLoader};

/// Processes a single batch, returning its loss.
pub type ProcessFn<C, B> = fn(&mut C, &EngineState, B) -> Result<f32>;

/// Reacts to an event of the run.
pub type HandlerFn<C> = fn(&mut C, &EngineState) -> Result<()>;

/// A minimal event-driven loop: a process function applied to every batch of
/// every epoch, with handlers fired at the boundaries.
///
/// The engine holds no state of its own besides the functions, the context `C`
/// is lent to it for the duration of `run`.
pub struct Engine<C, B> {
    process: ProcessFn<C, B>,
    handlers: Vec<(Event, HandlerFn<C>)>,
}

impl<C, B> Engine<C, B> {
    /// Creates a new `Engine`.
    ///
    /// # Arguments
    /// * `process` - The function applied to every batch.
    ///
    /// # Returns
    /// A new `Engine` instance with no handlers.
    pub fn new(process: ProcessFn<C, B>) -> Self {
        Self {
            process,
            handlers: Vec::new(),
        }
    }

    /// Attaches a handler to an event, handlers of the same event fire in the order they were added.
    ///
    /// # Arguments
    /// * `event` - The event to react to.
    /// * `handler` - The function to call.
    pub fn add_event_handler(&mut self, event: Event, handler: HandlerFn<C>) -> &mut Self {
        self.handlers.push((event, handler));
        self
    }

    /// Runs the loop.
    ///
    /// # Arguments
    /// * `ctx` - The context handed to the process function and the handlers.
    /// * `loader` - The source of batches, iterated once per epoch.
    /// * `max_epochs` - The amount of epochs to run.
    ///
    /// # Returns
    /// The final state, or the first error raised by the process function or a handler.
    pub fn run<L>(&self, ctx: &mut C, loader: &mut L, max_epochs: usize) -> Result<EngineState>
    where
        L: BatchLoader<Batch = B>,
    {
        let mut state = EngineState::new(max_epochs, loader.len());
        self.fire(Event::Started, ctx, &state)?;

        while state.epoch < max_epochs {
            state.epoch += 1;
            debug!("epoch {}/{max_epochs} started", state.epoch);
            self.fire(Event::EpochStarted, ctx, &state)?;

            for batch in loader.batches() {
                state.iteration += 1;
                state.output = Some((self.process)(ctx, &state, batch)?);
                self.fire(Event::IterationCompleted, ctx, &state)?;
            }

            self.fire(Event::EpochCompleted, ctx, &state)?;
        }

        self.fire(Event::Completed, ctx, &state)?;
        Ok(state)
    }

    fn fire(&self, event: Event, ctx: &mut C, state: &EngineState) -> Result<()> {
        for (_, handler) in self.handlers.iter().filter(|(e, _)| *e == event) {
            handler(ctx, state)?;
        }

        Ok(())
    }
}
