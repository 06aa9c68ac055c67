//! # Controller
//!
//! Core modules of the deploy operator.
//!
//! - `batch`: Walks the kustomization tree of a request
//! - `descriptor`: Kustomization descriptor parsing
//! - `manifest`: Typed manifest decoding and environment injection
//! - `reconciler`: Per-descriptor reconciliation
//! - `render`: Render variables per workload kind
//! - `templates`: Template registry and substitution

pub mod batch;
pub mod descriptor;
pub mod manifest;
pub mod reconciler;
pub mod render;
pub mod templates;
