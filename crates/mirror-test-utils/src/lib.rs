//! Shared test utilities for the treemirror workspace.
//!
//! This crate provides standardised filesystem fixtures so each crate's test
//! suite does not rebuild its own. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`tree`]: [`TestTree`], a temporary directory tree with helpers

pub mod tree;

pub use tree::TestTree;
