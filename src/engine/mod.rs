//! Execution engine and its store

pub mod core;
pub mod store;

pub use core::{EngineDeps, ExecutionEngine};
pub use store::{ExecutionStore, InMemoryExecutionStore};
