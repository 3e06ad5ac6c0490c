//! Folio: cache-aware content repository layer.
//!
//! Content services read through a fail-open cache, invalidate after every
//! committed write, and hide soft-deleted records unless asked otherwise.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
