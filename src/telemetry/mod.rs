//! Telemetry and logging infrastructure
//!
//! Provides structured logging with tracing. Library code logs through the
//! `log` macros, which the subscriber forwards into tracing.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogGuard};
