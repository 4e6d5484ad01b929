// src/core/mod.rs: Sweep-and-retry engine

pub mod backoff;
pub mod evaluator;
pub mod execution;
pub mod plan;
pub mod session;
pub mod sink;
pub mod sweep;
pub mod types;
