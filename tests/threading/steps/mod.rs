//! Cucumber step definitions for threading tests.

pub mod generation;
pub mod linkage;
