//! Strategy module
//!
//! EMA crossover detection with a process-wide debounce

mod crossover;
mod debounce;
mod engine;

pub use crossover::crossover_signal;
pub use debounce::Debouncer;
pub use engine::{DecisionEngine, EngineConfig, SignalHandler, TradeSignal};
