//! Core types and trait definitions for the Trellis matrix platform.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod activity;
pub mod error;
pub mod levels;
pub mod member;
pub mod reward;
pub mod store;
pub mod transfer;

pub use error::{Error, Result};
