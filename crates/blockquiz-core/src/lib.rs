//! blockquiz-core: Adaptive quiz block tree, conditions, and grading.
//!
//! This crate defines the block tree of a quiz, the conditions that unlock
//! its blocks, attempt-time evaluation (traversal, grades, feedback), and
//! the row, file and report formats the rest of the blockquiz system uses.

pub mod block;
pub mod condition;
pub mod config;
pub mod edit;
pub mod error;
pub mod feedback;
pub mod model;
pub mod parser;
pub mod report;
pub mod rows;
pub mod store;
pub mod traits;
pub mod tree;
mod validate;

#[cfg(test)]
mod fixtures;
