//! Host tree implementations.

pub mod memory;
