//! # Application Layer
//!
//! Use cases and orchestration logic coordinating domain and connector layers.

pub mod batching;
pub mod checkpoint;
pub mod concurrency;
pub mod interfaces;
pub mod memory;
pub mod orchestrator;
pub mod streaming;
pub mod use_cases;

pub use orchestrator::*;
pub use use_cases::*;
