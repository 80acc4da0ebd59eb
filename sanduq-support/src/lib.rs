//! # Sanduq Support
//!
//! Shared utilities for the Sanduq DI crates.
//!
//! This crate provides:
//! - Text rendering for error messages and `Debug` output

pub mod rendering;
