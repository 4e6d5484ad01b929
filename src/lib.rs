// src/lib.rs: Library root for wopbench

pub mod cli;
pub mod core;
pub mod infra;
pub mod simulator;
