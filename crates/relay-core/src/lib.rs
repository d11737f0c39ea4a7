//! Core domain + application logic for a single message channel.
//!
//! This crate is intentionally framework-agnostic. The HTTP surface and the
//! Open-Meteo lookups live behind ports (traits) implemented in adapter crates.

pub mod censor;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod security;
pub mod service;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
