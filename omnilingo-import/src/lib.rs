//! omnilingo-import library
//!
//! Imports a Common Voice dump into a content-addressable store and builds
//! an index from sentence identifiers to clip identifiers.
//!
//! - [`engine`]: chunked parallel execution (planner, pool, aggregator, progress)
//! - [`dataset`], [`store`], [`tagger`], [`processor`]: the Common Voice import work
//! - [`importer`]: one complete run, from validation to summary
//! - [`status`]: optional HTTP progress endpoint

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod importer;
pub mod processor;
pub mod status;
pub mod store;
pub mod tagger;

pub use error::{ImportError, ImportResult};
pub use importer::{ImportOptions, ImportReport, Importer};
