//! Retrieval-augmented QA over a Markdown knowledge base.
//!
//! `QaEngine` owns the pipeline: load, split, embed in batches, store, and at
//! query time embed the question, search, and optionally hand the hits to a
//! chat model.
#![deny(unused_imports)]

mod engine;
mod outcome;
pub mod prompt;

pub use engine::{similarity_from_distance, EngineSettings, QaEngine};
pub use outcome::{Answer, AskOutcome, BuildOutcome, IndexSummary};
