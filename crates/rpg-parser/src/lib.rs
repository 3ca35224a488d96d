//! Tree-sitter based code parsing for RPG entity and dependency extraction.
//!
//! Covers entity/import extraction, call-site extraction with receiver classification, and
//! inheritance/implementation extraction across eleven languages (six required, five optional).

pub mod ast;
pub mod calls;
pub mod inheritance;
pub mod languages;
pub mod treesitter;
