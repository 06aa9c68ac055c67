//! # Runtime
//!
//! Process bootstrap of the operator.

pub mod initialization;

pub use initialization::{initialize, install_crypto_provider, serve, InitializationResult};
