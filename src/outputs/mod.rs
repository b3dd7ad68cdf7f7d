//! Output generation for index files.
//!
//! # Submodules
//!
//! - [`json`]: Writes per-area article indexes, keyword summaries and
//!   timelines, plus the combined keyword file
//!
//! The article cache itself is written by [`crate::cache`] and the
//! relational store by [`crate::db`].

pub mod json;
