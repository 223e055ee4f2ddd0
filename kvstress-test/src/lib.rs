//! Test utilities for kvstress.
//!
//! This crate provides utilities to facilitate testing the load generator without a running
//! key-value store. See the modules for all available utilities.

pub mod fixtures;
pub mod tracing;
