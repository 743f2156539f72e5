//! Shared foundation: configuration, error types, and the ring buffer leaf.

pub mod config;
pub mod errors;
pub mod ring;
