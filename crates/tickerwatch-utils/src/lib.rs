//! Shared utilities for tickerwatch
//!
//! This crate provides common functionality used across the tickerwatch
//! workspace. Today that is the tracing subscriber setup shared by the
//! binaries.

pub mod logging;

pub use logging::{DEFAULT_FILTER, LogFormat, init_tracing, init_tracing_with, init_tracing_with_default};
