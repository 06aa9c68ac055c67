//! Deploy Operator Library
//!
//! This library provides the core functionality of the deploy operator.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use deploy_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod api;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod server;
