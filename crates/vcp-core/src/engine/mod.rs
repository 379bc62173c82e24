//! Turn engine: wires detection, dispatch and continuation over a provider stream

mod builder;
mod turn;

pub use builder::TurnEngineBuilder;
pub use turn::{TurnEngine, TurnStream};
