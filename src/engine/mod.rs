mod events;
mod runner;
mod state;

pub use events::Event;
pub use runner::{Engine, HandlerFn, ProcessFn};
pub use state::EngineState;
