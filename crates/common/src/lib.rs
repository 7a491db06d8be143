//! Common utilities for temper2-rs
//!
//! Shared ambient pieces used by the reader binary: the tracing subscriber
//! setup and the shared error type.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::setup_logging;
