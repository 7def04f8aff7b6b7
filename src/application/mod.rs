//! Application layer - the media engine
//!
//! Owns the media contexts, drives them from the scheduler and exposes an
//! async handle for structural changes.

pub mod context_factory;
pub mod engine;
pub mod scheduler;

pub use context_factory::ContextFactory;
pub use engine::{Engine, EngineCommand, EngineHandle};
pub use scheduler::Scheduler;
