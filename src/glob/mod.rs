// src/glob/mod.rs

//! Glob resolution.
//!
//! - [`resolver`] expands pattern lists into ordered, deduplicated
//!   [`FileSet`]s and applies order hints.
//! - [`fileset`] holds the [`FileSet`] type itself.

pub mod fileset;
pub mod resolver;

pub use fileset::{FileEntry, FileSet};
pub use resolver::{apply_order, compile_glob, compile_globset, glob_base, has_magic, GlobResolver};
