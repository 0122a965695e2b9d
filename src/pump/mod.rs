//! Per-project queue pump and its store

pub mod processor;
pub mod store;

pub use processor::TaskProcessor;
pub use store::{InMemoryQueueStore, QueueStore};
