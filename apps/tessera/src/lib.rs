//! # Tessera
//!
//! Library side of the Tessera binary: configuration and JSON datasets.
//!
//! The command-line front end in `main.rs` is built on these two modules;
//! both are public so integration tests can drive them directly.

pub mod config;
pub mod dataset;
