//! # OmniLingo Common Library
//!
//! Shared code for the OmniLingo tools including:
//! - Error type and result alias
//! - TOML configuration file loading
//! - Human-readable duration and throughput formatting

pub mod config;
pub mod error;
pub mod human_time;

pub use error::{Error, Result};
