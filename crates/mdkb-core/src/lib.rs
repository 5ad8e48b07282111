//! mdkb-core
//!
//! Domain types, error taxonomy, configuration, collaborator traits, and the
//! two pure transforms of the pipeline: Markdown loading and chunking.
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod loader;
pub mod splitter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
