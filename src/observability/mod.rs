//! # Observability
//!
//! Prometheus metrics and `tracing` subscriber setup.
//!
//! - `metrics`: Prometheus metrics collection
//! - `logging`: log level / format selection for the subscriber

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::init_tracing;
pub use metrics::register_metrics;
